//! Upload port (driven/secondary port)
//!
//! Remote storage is opaque to the engine: one call moves one local file
//! into one remote directory, keeping the local file name.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because transport errors are adapter-specific.
//! - A call is all-or-nothing from the engine's point of view. Partial
//!   uploads must be reported as failures.

use std::path::Path;

use crate::domain::newtypes::RemotePath;

/// Port trait for uploading artifacts to remote storage
#[async_trait::async_trait]
pub trait IUploader: Send + Sync {
    /// Uploads `local` into `remote_dir`
    ///
    /// The remote file name is the final component of `local`.
    ///
    /// # Errors
    /// Returns an error if the upload did not complete
    async fn upload(&self, local: &Path, remote_dir: &RemotePath) -> anyhow::Result<()>;
}
