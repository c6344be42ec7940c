//! Sync engine: incremental and bundle passes
//!
//! A pass holds its watch's pass gate from start to finish, so two passes
//! of one watch never overlap. It reads a snapshot of its [`WatchEntry`]
//! and then works through the tree without holding the registry lock. The
//! lock is only taken to record results, each followed by an immediate
//! save:
//!
//! - after every successful upload (the file's new fingerprint),
//! - before the first upload under a new anonymized name (the mapping),
//! - on the first anonymized bundle pass (the fixed bundle name).
//!
//! ## Failure handling
//!
//! A file that fails to hash, encrypt, rename or upload is logged and
//! left out of the state, so the next pass retries it. A save that fails
//! is logged as an error and the pass continues; the update is lost, so
//! the file is uploaded again by a later pass.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uplink_core::domain::{FileState, RelativePath, SyncMode, WatchEntry, WatchId};
use uplink_core::ports::{IEncryptor, ITreeWalker, IUploader};
use uuid::Uuid;

use crate::bundle;
use crate::detector::{ChangeDetector, Decision};
use crate::patterns::IgnoreRules;
use crate::state::SharedRegistry;
use crate::transform::TransformPipeline;
use crate::SyncError;

// ============================================================================
// SyncContext
// ============================================================================

/// External collaborators and settings shared by every pass
#[derive(Clone)]
pub struct SyncContext {
    pub uploader: Arc<dyn IUploader>,
    pub encryptor: Arc<dyn IEncryptor>,
    pub walker: Arc<dyn ITreeWalker>,
    /// Parent directory for encrypted copies and bundle archives
    pub temp_root: PathBuf,
    /// Ignore-rule file looked up in each root when none is configured
    pub ignore_file_name: String,
}

// ============================================================================
// PassReport
// ============================================================================

/// Summary of a completed pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Artifacts handed to the uploader successfully
    pub uploaded: u32,
    /// Files whose fingerprint matched the stored state
    pub unchanged: u32,
    /// Changed files excluded by ignore rules
    pub ignored: u32,
    /// Files (or the bundle) that failed and will be retried
    pub failed: u32,
    /// One message per failure
    pub errors: Vec<String>,
    /// Whether the pass stopped early on cancellation
    pub cancelled: bool,
    /// Wall-clock duration of the pass in milliseconds
    pub duration_ms: u64,
}

impl PassReport {
    fn record_failure(&mut self, what: impl std::fmt::Display, err: &anyhow::Error) {
        self.failed += 1;
        self.errors.push(format!("{what}: {err:#}"));
    }
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Runs passes for any watch in the shared registry
pub struct SyncEngine {
    shared: Arc<SharedRegistry>,
    uploader: Arc<dyn IUploader>,
    walker: Arc<dyn ITreeWalker>,
    pipeline: TransformPipeline,
    ignore_file_name: String,
}

impl SyncEngine {
    pub fn new(shared: Arc<SharedRegistry>, ctx: SyncContext) -> Self {
        Self {
            shared,
            uploader: ctx.uploader,
            walker: ctx.walker,
            pipeline: TransformPipeline::new(ctx.encryptor, ctx.temp_root),
            ignore_file_name: ctx.ignore_file_name,
        }
    }

    /// Run one pass of the watch `id`
    ///
    /// # Errors
    /// Returns `SyncError::UnknownWatch` if the watch no longer exists, or
    /// a registry error if the state cannot be loaded. Per-file failures
    /// are reported in the [`PassReport`], not as errors.
    #[tracing::instrument(skip(self, cancel), fields(watch = %id.short()))]
    pub async fn run_pass(
        &self,
        id: &WatchId,
        cancel: &CancellationToken,
    ) -> Result<PassReport, SyncError> {
        let started = Instant::now();
        let gate = self.shared.lock().await?.pass_gate(id);
        let _pass = gate.lock().await;

        let entry = {
            let guard = self.shared.lock().await?;
            guard
                .registry()
                .get(id)
                .cloned()
                .ok_or_else(|| SyncError::UnknownWatch(id.clone()))?
        };

        debug!(local = %entry.local.display(), mode = ?entry.mode, "Starting pass");

        let mut report = match entry.mode {
            SyncMode::Incremental => self.incremental_pass(id, &entry, cancel).await?,
            SyncMode::Bundle => self.bundle_pass(id, &entry).await,
        };
        report.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            local = %entry.local.display(),
            uploaded = report.uploaded,
            unchanged = report.unchanged,
            ignored = report.ignored,
            failed = report.failed,
            cancelled = report.cancelled,
            duration_ms = report.duration_ms,
            "Pass complete"
        );
        Ok(report)
    }

    // ========================================================================
    // Incremental pass
    // ========================================================================

    async fn incremental_pass(
        &self,
        id: &WatchId,
        entry: &WatchEntry,
        cancel: &CancellationToken,
    ) -> Result<PassReport, SyncError> {
        let mut report = PassReport::default();
        let rules = self.ignore_rules(id, entry).await?;

        let files = match self.walker.walk(&entry.local).await {
            Ok(files) => files,
            Err(err) => {
                warn!(local = %entry.local.display(), error = %format!("{err:#}"), "Failed to walk tree");
                report.record_failure(entry.local.display(), &err);
                return Ok(report);
            }
        };

        let detector = ChangeDetector::new(
            &entry.local,
            entry.effective_fingerprint(),
            &entry.files,
            &rules,
        );
        let mut names = entry.names_by_path();

        for path in files {
            if cancel.is_cancelled() {
                info!("Pass cancelled between files");
                report.cancelled = true;
                break;
            }

            let decision = match detector.inspect(&path).await {
                Ok(decision) => decision,
                Err(err) => {
                    warn!(path = %path.display(), error = %format!("{err:#}"), "Skipping file");
                    report.record_failure(path.display(), &err);
                    continue;
                }
            };

            match decision {
                Decision::Directory => {}
                Decision::Unchanged(_) => report.unchanged += 1,
                Decision::Ignored(rel) => {
                    debug!(file = %rel, "Ignored by rules");
                    report.ignored += 1;
                }
                Decision::Changed { rel, state } => {
                    if let Err(err) = self.upload_file(id, entry, &path, &rel, &mut names).await {
                        warn!(file = %rel, error = %format!("{err:#}"), "Upload failed, will retry next pass");
                        report.record_failure(&rel, &err);
                        continue;
                    }
                    report.uploaded += 1;
                    if !self.record_upload(id, rel, state).await? {
                        info!("Watch deleted during pass, stopping");
                        report.cancelled = true;
                        break;
                    }
                }
            }
        }

        Ok(report)
    }

    async fn upload_file(
        &self,
        id: &WatchId,
        entry: &WatchEntry,
        path: &Path,
        rel: &RelativePath,
        names: &mut HashMap<RelativePath, String>,
    ) -> Result<()> {
        let upload_name = if entry.anonymizes() {
            Some(self.anonymized_name(id, rel, names).await?)
        } else {
            None
        };

        let artifact = self
            .pipeline
            .prepare(path, entry.encryption.as_ref(), upload_name.as_deref())
            .await?;
        let remote_dir = entry.remote.join_dir(rel.parent())?;

        info!(file = %rel, remote = %remote_dir, name = %artifact.file_name(), "Uploading");
        self.uploader
            .upload(artifact.path(), &remote_dir)
            .await
            .with_context(|| format!("Failed to upload {rel} to {remote_dir}"))?;
        Ok(())
    }

    /// Existing anonymized name for `rel`, or a new one persisted before use
    async fn anonymized_name(
        &self,
        id: &WatchId,
        rel: &RelativePath,
        names: &mut HashMap<RelativePath, String>,
    ) -> Result<String> {
        if let Some(name) = names.get(rel) {
            return Ok(name.clone());
        }

        let name = Uuid::new_v4().to_string();
        let mut guard = self.shared.lock().await?;
        let watch = guard
            .registry_mut()
            .get_mut(id)
            .ok_or_else(|| SyncError::UnknownWatch(id.clone()))?;
        watch.name_map.insert(name.clone(), rel.clone());
        if let Err(err) = guard.persist().await {
            error!(file = %rel, error = %err, "Name mapping not saved");
        }
        drop(guard);

        info!(file = %rel, name = %name, "Assigned anonymized name");
        names.insert(rel.clone(), name.clone());
        Ok(name)
    }

    /// Store the uploaded fingerprint; `false` if the watch is gone
    async fn record_upload(
        &self,
        id: &WatchId,
        rel: RelativePath,
        state: FileState,
    ) -> Result<bool, SyncError> {
        let mut guard = self.shared.lock().await?;
        let Some(watch) = guard.registry_mut().get_mut(id) else {
            return Ok(false);
        };
        watch.files.insert(rel.clone(), state);
        if let Err(err) = guard.persist().await {
            error!(file = %rel, error = %err, "Upload not recorded, will resend");
        }
        Ok(true)
    }

    /// Compiled ignore rules for the watch, loaded once per process
    async fn ignore_rules(
        &self,
        id: &WatchId,
        entry: &WatchEntry,
    ) -> Result<Arc<IgnoreRules>, SyncError> {
        if let Some(rules) = self.shared.lock().await?.ignore_cache.get(id) {
            return Ok(rules.clone());
        }

        let rules = Arc::new(
            IgnoreRules::load_for_watch(
                &entry.local,
                entry.ignore_file.as_deref(),
                &self.ignore_file_name,
            )
            .await,
        );

        let mut guard = self.shared.lock().await?;
        Ok(guard
            .ignore_cache
            .entry(id.clone())
            .or_insert(rules)
            .clone())
    }

    // ========================================================================
    // Bundle pass
    // ========================================================================

    async fn bundle_pass(&self, id: &WatchId, entry: &WatchEntry) -> PassReport {
        let mut report = PassReport::default();
        match self.upload_bundle(id, entry).await {
            Ok(()) => report.uploaded = 1,
            Err(err) => {
                warn!(local = %entry.local.display(), error = %format!("{err:#}"), "Bundle upload failed, will retry next pass");
                report.record_failure(entry.local.display(), &err);
            }
        }
        report
    }

    async fn upload_bundle(&self, id: &WatchId, entry: &WatchEntry) -> Result<()> {
        let upload_name = if entry.anonymizes() {
            Some(self.bundle_name(id, entry).await?)
        } else {
            None
        };

        let files = self
            .walker
            .walk(&entry.local)
            .await
            .with_context(|| format!("Failed to walk {}", entry.local.display()))?;

        let scratch = self.pipeline.scratch_dir().await?;
        let archive = scratch.path().join(bundle::archive_name(&entry.local));
        let entries = bundle::write_archive(&entry.local, files, &archive).await?;

        let artifact = self
            .pipeline
            .prepare(&archive, entry.encryption.as_ref(), upload_name.as_deref())
            .await?;

        info!(entries, remote = %entry.remote, name = %artifact.file_name(), "Uploading bundle");
        self.uploader
            .upload(artifact.path(), &entry.remote)
            .await
            .with_context(|| format!("Failed to upload bundle to {}", entry.remote))?;
        Ok(())
    }

    /// The watch's fixed bundle name, minted and persisted on first use
    async fn bundle_name(&self, id: &WatchId, entry: &WatchEntry) -> Result<String> {
        if let Some(name) = &entry.bundle_name {
            return Ok(name.clone());
        }

        let mut guard = self.shared.lock().await?;
        let watch = guard
            .registry_mut()
            .get_mut(id)
            .ok_or_else(|| SyncError::UnknownWatch(id.clone()))?;
        if let Some(name) = &watch.bundle_name {
            return Ok(name.clone());
        }

        let name = Uuid::new_v4().to_string();
        watch.bundle_name = Some(name.clone());
        if let Err(err) = guard.persist().await {
            error!(error = %err, "Bundle name not saved");
        }
        info!(name = %name, "Assigned bundle name");
        Ok(name)
    }
}

// ============================================================================
// Unit tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tempfile::TempDir;
    use uplink_core::domain::{EncryptionSettings, Registry, RemotePath};

    use super::*;
    use crate::filesystem::LocalTreeWalker;
    use crate::store::MemoryStateStore;

    /// Records (file name, remote dir, content) for every upload
    #[derive(Default)]
    struct RecordingUploader {
        calls: Mutex<Vec<(String, String, Vec<u8>)>>,
        fail_names: Vec<String>,
        /// Fired after each successful upload
        cancel_after: Option<CancellationToken>,
    }

    #[async_trait::async_trait]
    impl IUploader for RecordingUploader {
        async fn upload(&self, local: &Path, remote_dir: &RemotePath) -> Result<()> {
            let name = local.file_name().unwrap().to_string_lossy().into_owned();
            if self.fail_names.contains(&name) {
                anyhow::bail!("remote rejected {name}");
            }
            let content = tokio::fs::read(local).await?;
            self.calls
                .lock()
                .unwrap()
                .push((name, remote_dir.to_string(), content));
            if let Some(cancel) = &self.cancel_after {
                cancel.cancel();
            }
            Ok(())
        }
    }

    struct PrefixEncryptor;

    #[async_trait::async_trait]
    impl IEncryptor for PrefixEncryptor {
        async fn encrypt(&self, input: &Path, output: &Path, _key: &str, _method: &str) -> Result<()> {
            let mut data = b"ENC:".to_vec();
            data.extend(tokio::fs::read(input).await?);
            tokio::fs::write(output, data).await?;
            Ok(())
        }
    }

    struct Fixture {
        _tmp: TempDir,
        root: PathBuf,
        store: Arc<MemoryStateStore>,
        uploader: Arc<RecordingUploader>,
        engine: SyncEngine,
    }

    async fn fixture(configure: impl FnOnce(WatchEntry) -> WatchEntry, uploader: RecordingUploader) -> (Fixture, WatchId) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        tokio::fs::create_dir_all(root.join("sub")).await.unwrap();
        tokio::fs::write(root.join("a.txt"), b"alpha").await.unwrap();
        tokio::fs::write(root.join("sub").join("b.txt"), b"beta").await.unwrap();

        let entry = configure(
            WatchEntry::new(root.clone(), RemotePath::new("/backup").unwrap(), 60).unwrap(),
        );
        let id = entry.id();
        let mut registry = Registry::new();
        registry.insert(entry);

        let store = Arc::new(MemoryStateStore::new());
        store.seed(registry);
        let uploader = Arc::new(uploader);
        let shared = Arc::new(SharedRegistry::new(store.clone()));
        let engine = SyncEngine::new(
            shared,
            SyncContext {
                uploader: uploader.clone(),
                encryptor: Arc::new(PrefixEncryptor),
                walker: Arc::new(LocalTreeWalker::new()),
                temp_root: tmp.path().join("scratch"),
                ignore_file_name: ".uplinkignore".to_string(),
            },
        );

        (
            Fixture {
                _tmp: tmp,
                root,
                store,
                uploader,
                engine,
            },
            id,
        )
    }

    fn encrypted(entry: WatchEntry) -> WatchEntry {
        entry.with_encryption(Some(EncryptionSettings {
            key: "k".to_string(),
            method: "aes-256-gcm".to_string(),
        }))
    }

    #[tokio::test]
    async fn test_incremental_uploads_and_records() {
        let (fx, id) = fixture(|e| e, RecordingUploader::default()).await;

        let report = fx.engine.run_pass(&id, &CancellationToken::new()).await.unwrap();
        assert_eq!(report.uploaded, 2);
        assert_eq!(report.failed, 0);

        let mut calls: Vec<(String, String)> = fx
            .uploader
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(n, r, _)| (n.clone(), r.clone()))
            .collect();
        calls.sort();
        assert_eq!(
            calls,
            vec![
                ("a.txt".to_string(), "/backup".to_string()),
                ("b.txt".to_string(), "/backup/sub".to_string()),
            ]
        );

        let saved = fx.store.snapshot();
        assert_eq!(saved.get(&id).unwrap().files.len(), 2);
    }

    #[tokio::test]
    async fn test_second_pass_uploads_nothing() {
        let (fx, id) = fixture(|e| e, RecordingUploader::default()).await;
        let cancel = CancellationToken::new();

        fx.engine.run_pass(&id, &cancel).await.unwrap();
        let saves = fx.store.saves();

        let report = fx.engine.run_pass(&id, &cancel).await.unwrap();
        assert_eq!(report.uploaded, 0);
        assert_eq!(report.unchanged, 2);
        assert_eq!(fx.store.saves(), saves);
    }

    #[tokio::test]
    async fn test_failed_upload_is_not_recorded() {
        let uploader = RecordingUploader {
            fail_names: vec!["b.txt".to_string()],
            ..Default::default()
        };
        let (fx, id) = fixture(|e| e, uploader).await;

        let report = fx.engine.run_pass(&id, &CancellationToken::new()).await.unwrap();
        assert_eq!(report.uploaded, 1);
        assert_eq!(report.failed, 1);
        assert!(report.errors[0].contains("sub/b.txt"));

        let files = fx.store.snapshot().get(&id).unwrap().files.clone();
        assert!(files.contains_key(&RelativePath::new("a.txt").unwrap()));
        assert!(!files.contains_key(&RelativePath::new("sub/b.txt").unwrap()));
    }

    #[tokio::test]
    async fn test_encrypted_upload_keeps_source() {
        let (fx, id) = fixture(encrypted, RecordingUploader::default()).await;

        fx.engine.run_pass(&id, &CancellationToken::new()).await.unwrap();

        let calls = fx.uploader.calls.lock().unwrap().clone();
        let a = calls.iter().find(|(n, _, _)| n == "a.txt.encrypted").unwrap();
        assert_eq!(a.2, b"ENC:alpha");
        assert_eq!(tokio::fs::read(fx.root.join("a.txt")).await.unwrap(), b"alpha");
        assert!(!fx.root.join("a.txt.encrypted").exists());
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_before_first_file() {
        let (fx, id) = fixture(|e| e, RecordingUploader::default()).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = fx.engine.run_pass(&id, &cancel).await.unwrap();
        assert!(report.cancelled);
        assert_eq!(report.uploaded, 0);
    }

    #[tokio::test]
    async fn test_cancel_during_pass_stops_after_current_file() {
        let cancel = CancellationToken::new();
        let uploader = RecordingUploader {
            cancel_after: Some(cancel.clone()),
            ..Default::default()
        };
        let (fx, id) = fixture(|e| e, uploader).await;

        let report = fx.engine.run_pass(&id, &cancel).await.unwrap();
        assert!(report.cancelled);
        assert_eq!(report.uploaded, 1);
        assert_eq!(fx.uploader.calls.lock().unwrap().len(), 1);

        // The file that did go out is recorded; the other waits for next time.
        assert_eq!(fx.store.snapshot().get(&id).unwrap().files.len(), 1);

        let report = fx.engine.run_pass(&id, &CancellationToken::new()).await.unwrap();
        assert_eq!(report.uploaded, 1);
        assert_eq!(report.unchanged, 1);
    }

    #[tokio::test]
    async fn test_save_failure_keeps_pass_going() {
        let (fx, id) = fixture(|e| e, RecordingUploader::default()).await;
        fx.store.fail_saves(true);

        let report = fx.engine.run_pass(&id, &CancellationToken::new()).await.unwrap();
        assert_eq!(report.uploaded, 2);
        assert!(fx.store.snapshot().get(&id).unwrap().files.is_empty());

        // Nothing was recorded durably, so the next pass sends both again.
        fx.store.fail_saves(false);
        let report = fx.engine.run_pass(&id, &CancellationToken::new()).await.unwrap();
        assert_eq!(report.uploaded, 2);
        assert_eq!(fx.store.snapshot().get(&id).unwrap().files.len(), 2);
    }

    #[tokio::test]
    async fn test_bundle_pass_uploads_archive_to_remote_root() {
        let (fx, id) = fixture(|e| e.with_mode(SyncMode::Bundle), RecordingUploader::default()).await;

        let report = fx.engine.run_pass(&id, &CancellationToken::new()).await.unwrap();
        assert_eq!(report.uploaded, 1);

        let calls = fx.uploader.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "root.zip");
        assert_eq!(calls[0].1, "/backup");
        assert!(fx.store.snapshot().get(&id).unwrap().files.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_watch() {
        let (fx, _) = fixture(|e| e, RecordingUploader::default()).await;
        let other = WatchId::for_path(Path::new("/elsewhere"));

        let result = fx.engine.run_pass(&other, &CancellationToken::new()).await;
        assert!(matches!(result, Err(SyncError::UnknownWatch(_))));
    }
}
