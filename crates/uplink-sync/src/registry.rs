//! Watch registry - the public API of uplink-sync
//!
//! [`WatchRegistry`] is constructed once and passed to whoever needs it.
//! Watches are addressed by their local root; every path argument is
//! canonicalized before the id lookup so `./docs` and `/home/u/docs`
//! refer to the same watch.
//!
//! Mutations (add, delete) reload the registry, apply the change and save
//! it while the registry lock is held. A failed save is returned as
//! `SyncError::Persistence` and the change does not take effect.
//!
//! Stopping a watch only signals its task. The task may still be finishing
//! a file, so it is kept in `stopping` until it exits, and a later start or
//! one-off pass for the same watch waits for it first.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uplink_core::domain::{
    EncryptionSettings, FingerprintMode, RemotePath, SyncMode, WatchEntry, WatchId,
};
use uplink_core::ports::IStateStore;

use crate::engine::{PassReport, SyncContext, SyncEngine};
use crate::scheduler::WatchTask;
use crate::state::{SharedRegistry, WatchRuntime};
use crate::SyncError;

// ============================================================================
// Request / response types
// ============================================================================

/// Parameters of a new watch
#[derive(Debug, Clone)]
pub struct NewWatch {
    pub local: PathBuf,
    pub remote: String,
    pub interval_secs: u64,
    /// `None`, or a settings value with an empty key, disables encryption
    pub encryption: Option<EncryptionSettings>,
    pub ignore_file: Option<PathBuf>,
    pub anonymize_names: bool,
    pub mode: SyncMode,
    pub fingerprint: FingerprintMode,
}

impl NewWatch {
    /// Plain incremental watch with no encryption and default rules
    pub fn new(local: impl Into<PathBuf>, remote: impl Into<String>, interval_secs: u64) -> Self {
        Self {
            local: local.into(),
            remote: remote.into(),
            interval_secs,
            encryption: None,
            ignore_file: None,
            anonymize_names: false,
            mode: SyncMode::default(),
            fingerprint: FingerprintMode::default(),
        }
    }
}

/// A persisted watch joined with its runtime state
#[derive(Debug, Clone)]
pub struct WatchStatus {
    pub id: WatchId,
    pub entry: WatchEntry,
    pub running: bool,
}

// ============================================================================
// WatchRegistry
// ============================================================================

/// Configures watches and owns their periodic tasks
pub struct WatchRegistry {
    shared: Arc<SharedRegistry>,
    engine: Arc<SyncEngine>,
}

impl WatchRegistry {
    pub fn new(store: Arc<dyn IStateStore>, ctx: SyncContext) -> Self {
        let shared = Arc::new(SharedRegistry::new(store));
        let engine = Arc::new(SyncEngine::new(shared.clone(), ctx));
        Self { shared, engine }
    }

    /// Register a new watch
    ///
    /// # Errors
    /// - `NotADirectory` if `local` does not exist or is not a directory
    /// - `DomainError` for an invalid remote path or a zero interval
    /// - `AlreadyExists` if the canonical root is already watched
    /// - `Persistence` if the entry could not be saved
    #[instrument(skip(self, request), fields(local = %request.local.display(), remote = %request.remote))]
    pub async fn add_watch(&self, request: NewWatch) -> Result<WatchEntry, SyncError> {
        let local = match tokio::fs::canonicalize(&request.local).await {
            Ok(path) if path.is_dir() => path,
            _ => return Err(SyncError::NotADirectory(request.local)),
        };
        let remote = RemotePath::new(request.remote)?;
        let encryption = request.encryption.filter(|e| !e.key.is_empty());

        let entry = WatchEntry::new(local.clone(), remote, request.interval_secs)?
            .with_encryption(encryption)
            .with_ignore_file(request.ignore_file)
            .with_anonymized_names(request.anonymize_names)
            .with_mode(request.mode)
            .with_fingerprint(request.fingerprint);
        let id = entry.id();

        let mut guard = self.shared.lock().await?;
        if guard.registry().contains(&id) {
            return Err(SyncError::AlreadyExists(local));
        }
        if entry.anonymize_names && entry.encryption.is_none() {
            warn!("Name anonymization requires encryption and will not be applied");
        }
        guard.registry_mut().insert(entry.clone());
        guard.persist().await?;

        info!(watch = %id.short(), "Watch added");
        Ok(entry)
    }

    /// Remove a watch, cancelling its task first
    ///
    /// Returns once the cancelled task has exited, so a pass in progress
    /// cannot record anything into a watch re-added under the same root.
    ///
    /// # Errors
    /// `NotFound` if no watch exists for `local`, `Persistence` if the
    /// removal could not be saved
    #[instrument(skip(self), fields(local = %local.display()))]
    pub async fn delete_watch(&self, local: &Path) -> Result<(), SyncError> {
        let root = canonical_root(local).await;
        let id = WatchId::for_path(&root);

        let mut guard = self.shared.lock().await?;
        if !guard.registry().contains(&id) {
            return Err(SyncError::NotFound(root));
        }
        guard.retire(&id);
        let task = guard.stopping.remove(&id);
        guard.ignore_cache.remove(&id);
        guard.registry_mut().remove(&id);
        let saved = guard.persist().await;
        drop(guard);

        if let Some(handle) = task {
            join_task(handle).await;
        }
        saved?;

        info!(watch = %id.short(), "Watch deleted");
        Ok(())
    }

    /// Every watch with its running flag
    ///
    /// # Errors
    /// Returns `StateCorrupt` if the persisted state cannot be loaded
    pub async fn list_watches(&self) -> Result<Vec<WatchStatus>, SyncError> {
        let guard = self.shared.lock().await?;
        Ok(guard
            .registry()
            .iter()
            .map(|(id, entry)| WatchStatus {
                id: id.clone(),
                entry: entry.clone(),
                running: guard.runtimes.contains_key(id),
            })
            .collect())
    }

    /// Launch the periodic task of a watch
    ///
    /// A task stopped earlier that is still finishing a file is waited for
    /// before the new one is spawned.
    ///
    /// # Errors
    /// `NotFound` if no watch exists, `AlreadyRunning` if it has a task or
    /// a one-off pass in flight
    #[instrument(skip(self), fields(local = %local.display()))]
    pub async fn start_watch(&self, local: &Path) -> Result<(), SyncError> {
        let root = canonical_root(local).await;
        let id = WatchId::for_path(&root);
        self.settle(Some(&id)).await?;

        let mut guard = self.shared.lock().await?;
        let period = match guard.registry().get(&id) {
            Some(entry) => entry.interval(),
            None => return Err(SyncError::NotFound(root)),
        };
        if guard.is_busy(&id) {
            return Err(SyncError::AlreadyRunning(root));
        }

        let runtime = self.spawn_task(&id, period);
        guard.runtimes.insert(id, runtime);
        info!("Watch started");
        Ok(())
    }

    /// Signal a watch's task to stop
    ///
    /// Returns once the task is signalled; a pass in progress finishes its
    /// current file first.
    ///
    /// # Errors
    /// `NotFound` if no watch exists, `NotRunning` if it has no task
    #[instrument(skip(self), fields(local = %local.display()))]
    pub async fn stop_watch(&self, local: &Path) -> Result<(), SyncError> {
        let root = canonical_root(local).await;
        let id = WatchId::for_path(&root);

        let mut guard = self.shared.lock().await?;
        if !guard.registry().contains(&id) {
            return Err(SyncError::NotFound(root));
        }
        if !guard.retire(&id) {
            return Err(SyncError::NotRunning(root));
        }
        info!("Watch stopped");
        Ok(())
    }

    /// Start every stopped watch; returns how many were started
    ///
    /// # Errors
    /// Returns `StateCorrupt` if the persisted state cannot be loaded
    pub async fn start_all(&self) -> Result<usize, SyncError> {
        self.settle(None).await?;

        let mut guard = self.shared.lock().await?;
        let idle: Vec<_> = guard
            .registry()
            .iter()
            .filter(|(id, _)| !guard.is_busy(id))
            .map(|(id, entry)| (id.clone(), entry.interval()))
            .collect();

        for (id, period) in &idle {
            let runtime = self.spawn_task(id, *period);
            guard.runtimes.insert(id.clone(), runtime);
        }

        info!(started = idle.len(), total = guard.registry().len(), "Started watches");
        Ok(idle.len())
    }

    /// Stop every running watch; returns how many were stopped
    ///
    /// # Errors
    /// Returns `StateCorrupt` if the persisted state cannot be loaded
    pub async fn stop_all(&self) -> Result<usize, SyncError> {
        let mut guard = self.shared.lock().await?;
        let running: Vec<WatchId> = guard.runtimes.keys().cloned().collect();
        for id in &running {
            guard.retire(id);
        }
        let stopped = running.len();
        info!(stopped, "Stopped watches");
        Ok(stopped)
    }

    /// Run exactly one pass of a stopped watch and wait for it
    ///
    /// # Errors
    /// `NotFound` if no watch exists, `AlreadyRunning` if its task is
    /// active or another one-off pass is in flight
    #[instrument(skip(self), fields(local = %local.display()))]
    pub async fn run_once(&self, local: &Path) -> Result<PassReport, SyncError> {
        let root = canonical_root(local).await;
        let id = WatchId::for_path(&root);
        self.settle(Some(&id)).await?;

        {
            let mut guard = self.shared.lock().await?;
            if !guard.registry().contains(&id) {
                return Err(SyncError::NotFound(root));
            }
            if guard.is_busy(&id) {
                return Err(SyncError::AlreadyRunning(root));
            }
            guard.manual_passes.insert(id.clone());
        }

        let result = self.engine.run_pass(&id, &CancellationToken::new()).await;
        self.shared.lock().await?.manual_passes.remove(&id);
        result
    }

    /// Cancel every running watch and wait for the tasks to exit
    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = match self.shared.lock().await {
            Ok(mut guard) => {
                let running: Vec<WatchId> = guard.runtimes.keys().cloned().collect();
                for id in &running {
                    guard.retire(id);
                }
                guard.stopping.drain().map(|(_, handle)| handle).collect()
            }
            Err(err) => {
                warn!(error = %err, "Registry unavailable during shutdown");
                return;
            }
        };

        let count = handles.len();
        for handle in handles {
            join_task(handle).await;
        }
        info!(tasks = count, "Shutdown complete");
    }

    /// Wait for stopped tasks of `id` (or of every watch) that are still
    /// winding down
    async fn settle(&self, id: Option<&WatchId>) -> Result<(), SyncError> {
        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.shared.lock().await?;
            match id {
                Some(id) => guard.stopping.remove(id).into_iter().collect(),
                None => guard.stopping.drain().map(|(_, handle)| handle).collect(),
            }
        };
        for handle in handles {
            join_task(handle).await;
        }
        Ok(())
    }

    fn spawn_task(&self, id: &WatchId, period: std::time::Duration) -> WatchRuntime {
        let cancel = CancellationToken::new();
        let handle =
            WatchTask::new(id.clone(), self.engine.clone(), period, cancel.clone()).spawn();
        WatchRuntime { cancel, handle }
    }
}

async fn join_task(handle: JoinHandle<()>) {
    if let Err(err) = handle.await {
        warn!(error = %err, "Watch task ended abnormally");
    }
}

// ============================================================================
// Path canonicalization
// ============================================================================

/// Resolve symlinks when the path exists, otherwise normalize lexically
///
/// Deleted or unmounted roots must still be addressable for delete/stop.
async fn canonical_root(path: &Path) -> PathBuf {
    match tokio::fs::canonicalize(path).await {
        Ok(resolved) => resolved,
        Err(_) => lexical_absolute(path),
    }
}

fn lexical_absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

// ============================================================================
// Unit tests
// ============================================================================
