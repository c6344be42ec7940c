//! Registry persistence adapters
//!
//! - [`JsonStateStore`] keeps the registry in one pretty-printed JSON file,
//!   written atomically (temp file + rename).
//! - [`MemoryStateStore`] keeps it in process memory, with switches to make
//!   loads or saves fail.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::{debug, instrument};
use uplink_core::domain::Registry;
use uplink_core::ports::IStateStore;

// ============================================================================
// JsonStateStore
// ============================================================================

/// Registry stored as a JSON document on disk
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl IStateStore for JsonStateStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Registry> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("State file missing, starting empty");
                return Ok(Registry::new());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };

        if content.trim().is_empty() {
            debug!("State file empty, starting empty");
            return Ok(Registry::new());
        }

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    #[instrument(skip(self, registry), fields(path = %self.path.display(), watches = registry.len()))]
    async fn save(&self, registry: &Registry) -> Result<()> {
        let json = serde_json::to_vec_pretty(registry).context("Failed to serialize registry")?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        // Same directory as the target so the rename stays on one filesystem.
        let tmp_path = {
            let mut p = self.path.as_os_str().to_owned();
            p.push(".tmp");
            PathBuf::from(p)
        };

        tokio::fs::write(&tmp_path, &json)
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!(bytes = json.len(), "State file written");
        Ok(())
    }
}

// ============================================================================
// MemoryStateStore
// ============================================================================

/// Registry kept in memory; nothing survives the process
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    registry: Mutex<Registry>,
    loads: AtomicUsize,
    saves: AtomicUsize,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored registry without counting a save
    pub fn seed(&self, registry: Registry) {
        *self.lock() = registry;
    }

    /// Copy of the last saved registry
    pub fn snapshot(&self) -> Registry {
        self.lock().clone()
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl IStateStore for MemoryStateStore {
    async fn load(&self) -> Result<Registry> {
        if self.fail_loads.load(Ordering::SeqCst) {
            anyhow::bail!("memory store configured to fail loads");
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot())
    }

    async fn save(&self, registry: &Registry) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            anyhow::bail!("memory store configured to fail saves");
        }
        *self.lock() = registry.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Unit tests
// ============================================================================
