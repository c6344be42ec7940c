//! Local filesystem adapters (secondary/driven adapters)
//!
//! - [`LocalTreeWalker`] implements [`ITreeWalker`] with a recursive
//!   `tokio::fs` walk.
//! - [`MirrorUploader`] implements [`IUploader`] by copying artifacts below
//!   a local directory that stands in for remote storage.
//!
//! ## Design Decisions
//!
//! - **Symlinks**: not followed by the walker, so cycles cannot occur.
//! - **Atomic writes**: the mirror copies to `<name>.tmp` and renames, so a
//!   reader never sees a half-written remote file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, instrument};
use uplink_core::domain::RemotePath;
use uplink_core::ports::{ITreeWalker, IUploader};

// ============================================================================
// LocalTreeWalker
// ============================================================================

/// Lists regular files below a root using `tokio::fs`
#[derive(Debug, Clone, Default)]
pub struct LocalTreeWalker;

impl LocalTreeWalker {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn walk_directory<'a>(
        &'a self,
        dir: &'a Path,
        files: &'a mut Vec<PathBuf>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut entries = tokio::fs::read_dir(dir)
                .await
                .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;

                if file_type.is_dir() {
                    self.walk_directory(&path, files).await?;
                } else if file_type.is_file() {
                    files.push(path);
                }
            }

            Ok(())
        })
    }
}

#[async_trait::async_trait]
impl ITreeWalker for LocalTreeWalker {
    #[instrument(skip(self), fields(root = %root.display()))]
    async fn walk(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        self.walk_directory(root, &mut files).await?;
        debug!(files = files.len(), "walk complete");
        Ok(files)
    }
}

// ============================================================================
// MirrorUploader
// ============================================================================

/// Uploads by copying into `<mirror_root>/<remote_dir>/<file name>`
#[derive(Debug, Clone)]
pub struct MirrorUploader {
    mirror_root: PathBuf,
}

impl MirrorUploader {
    pub fn new(mirror_root: PathBuf) -> Self {
        Self { mirror_root }
    }

    /// Local directory that mirrors `remote_dir`
    pub fn target_dir(&self, remote_dir: &RemotePath) -> PathBuf {
        let rel = remote_dir.as_str().trim_start_matches('/');
        if rel.is_empty() {
            self.mirror_root.clone()
        } else {
            self.mirror_root.join(rel)
        }
    }
}

#[async_trait::async_trait]
impl IUploader for MirrorUploader {
    #[instrument(skip(self), fields(local = %local.display(), remote = %remote_dir))]
    async fn upload(&self, local: &Path, remote_dir: &RemotePath) -> Result<()> {
        let name = local
            .file_name()
            .with_context(|| format!("Artifact has no file name: {}", local.display()))?;
        let dir = self.target_dir(remote_dir);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let target = dir.join(name);
        let tmp_path = {
            let mut p = target.as_os_str().to_owned();
            p.push(".tmp");
            PathBuf::from(p)
        };

        let bytes = tokio::fs::copy(local, &tmp_path)
            .await
            .with_context(|| format!("Failed to copy {}", local.display()))?;
        tokio::fs::rename(&tmp_path, &target)
            .await
            .with_context(|| format!("Failed to move into {}", target.display()))?;

        debug!(bytes, target = %target.display(), "upload complete");
        Ok(())
    }
}

// ============================================================================
// Unit tests
// ============================================================================
