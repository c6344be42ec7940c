//! Tree enumeration port (driven/secondary port)

use std::path::{Path, PathBuf};

/// Port trait for listing the files below a root
#[async_trait::async_trait]
pub trait ITreeWalker: Send + Sync {
    /// Returns the absolute paths of all files below `root`, nested
    /// directories included, in no particular order
    ///
    /// # Errors
    /// Returns an error if `root` cannot be read
    async fn walk(&self, root: &Path) -> anyhow::Result<Vec<PathBuf>>;
}
