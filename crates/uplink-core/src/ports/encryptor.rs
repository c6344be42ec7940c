//! Encryption port (driven/secondary port)

use std::path::Path;

/// Port trait for file encryption
///
/// Implementations read `input` and write the ciphertext to `output`.
/// The input file must never be modified.
#[async_trait::async_trait]
pub trait IEncryptor: Send + Sync {
    /// Encrypts `input` into `output` using `key` and the named `method`
    ///
    /// # Errors
    /// Returns an error for unknown methods or any I/O failure
    async fn encrypt(
        &self,
        input: &Path,
        output: &Path,
        key: &str,
        method: &str,
    ) -> anyhow::Result<()>;
}
