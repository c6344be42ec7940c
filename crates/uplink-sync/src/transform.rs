//! Transform pipeline: encryption and anonymized naming
//!
//! Turns a source file into the [`Artifact`] that is handed to the
//! uploader:
//!
//! | key | anonymize | artifact                                    |
//! |-----|-----------|---------------------------------------------|
//! | no  | any       | the source file itself                      |
//! | yes | no        | `<name>.encrypted` in a scratch directory   |
//! | yes | yes       | the encrypted copy renamed to the given name |
//!
//! Every scratch directory is owned by its artifact and removed when the
//! artifact is dropped, whether or not the upload succeeded. The source
//! file is only ever read.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tempfile::TempDir;
use tracing::debug;
use uplink_core::domain::EncryptionSettings;
use uplink_core::ports::IEncryptor;

/// Suffix of encrypted artifacts that keep their original name
pub const ENCRYPTED_SUFFIX: &str = ".encrypted";

/// A file ready for upload
///
/// Holds the scratch directory (if any) alive until dropped.
#[derive(Debug)]
pub struct Artifact {
    path: PathBuf,
    workspace: Option<TempDir>,
}

impl Artifact {
    /// Artifact that is the untouched source file
    pub fn passthrough(path: PathBuf) -> Self {
        Self {
            path,
            workspace: None,
        }
    }

    /// Artifact living in (and owning) a scratch directory
    pub fn scratch(path: PathBuf, scratch: TempDir) -> Self {
        Self {
            path,
            workspace: Some(scratch),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name the artifact will carry remotely
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn is_transformed(&self) -> bool {
        self.workspace.is_some()
    }
}

/// Prepares artifacts from source files
#[derive(Clone)]
pub struct TransformPipeline {
    encryptor: Arc<dyn IEncryptor>,
    temp_root: PathBuf,
}

impl TransformPipeline {
    pub fn new(encryptor: Arc<dyn IEncryptor>, temp_root: PathBuf) -> Self {
        Self {
            encryptor,
            temp_root,
        }
    }

    /// Create a fresh scratch directory below the temp root
    ///
    /// # Errors
    /// Returns an error if the temp root cannot be created
    pub async fn scratch_dir(&self) -> Result<TempDir> {
        tokio::fs::create_dir_all(&self.temp_root)
            .await
            .with_context(|| format!("Failed to create {}", self.temp_root.display()))?;
        tempfile::Builder::new()
            .prefix("uplink-")
            .tempdir_in(&self.temp_root)
            .with_context(|| format!("Failed to create scratch dir in {}", self.temp_root.display()))
    }

    /// Turn `source` into an upload artifact
    ///
    /// `upload_name` replaces the artifact's file name; it only has an
    /// effect when `encryption` is set.
    ///
    /// # Errors
    /// Returns an error if encryption or the rename fails; nothing is left
    /// behind in that case
    pub async fn prepare(
        &self,
        source: &Path,
        encryption: Option<&EncryptionSettings>,
        upload_name: Option<&str>,
    ) -> Result<Artifact> {
        let Some(settings) = encryption else {
            return Ok(Artifact::passthrough(source.to_path_buf()));
        };

        let scratch = self.scratch_dir().await?;
        let base = source
            .file_name()
            .with_context(|| format!("Source has no file name: {}", source.display()))?;
        let mut encrypted_name = base.to_os_string();
        encrypted_name.push(ENCRYPTED_SUFFIX);
        let encrypted = scratch.path().join(encrypted_name);

        self.encryptor
            .encrypt(source, &encrypted, &settings.key, &settings.method)
            .await
            .with_context(|| format!("Failed to encrypt {}", source.display()))?;

        let path = match upload_name {
            Some(name) => {
                let renamed = scratch.path().join(name);
                tokio::fs::rename(&encrypted, &renamed)
                    .await
                    .with_context(|| format!("Failed to rename encrypted copy to {name}"))?;
                renamed
            }
            None => encrypted,
        };

        debug!(source = %source.display(), artifact = %path.display(), "Prepared encrypted artifact");
        Ok(Artifact::scratch(path, scratch))
    }
}
