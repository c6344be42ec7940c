//! AES-GCM encryptor adapter
//!
//! Implements [`IEncryptor`] for `aes-128-gcm` and `aes-256-gcm`. The
//! cipher key is derived from the configured key string with SHA-256
//! (truncated to 16 bytes for AES-128). The output file is the 12-byte
//! random nonce followed by the ciphertext and tag.

use std::path::Path;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use anyhow::{anyhow, bail, Context, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};
use uplink_core::ports::IEncryptor;

/// Length of the nonce prefix in every encrypted file
pub const NONCE_LEN: usize = 12;

/// Cipher selected by a method name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Aes128Gcm,
    Aes256Gcm,
}

impl Method {
    /// Parse a method name, case-insensitively
    ///
    /// # Errors
    /// Returns an error for unknown method names
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "aes-128-gcm" => Ok(Self::Aes128Gcm),
            "aes-256-gcm" => Ok(Self::Aes256Gcm),
            other => bail!("unsupported encryption method: {other}"),
        }
    }
}

fn derive_key(key: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.finalize().into()
}

fn seal(method: Method, key: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
    let material = derive_key(key);
    let (nonce, ciphertext) = match method {
        Method::Aes128Gcm => {
            let cipher = Aes128Gcm::new_from_slice(&material[..16])
                .map_err(|_| anyhow!("invalid AES-128 key length"))?;
            let nonce = Aes128Gcm::generate_nonce(&mut OsRng);
            let sealed = cipher
                .encrypt(&nonce, plaintext)
                .map_err(|_| anyhow!("AES-128-GCM encryption failed"))?;
            (nonce.to_vec(), sealed)
        }
        Method::Aes256Gcm => {
            let cipher = Aes256Gcm::new_from_slice(&material)
                .map_err(|_| anyhow!("invalid AES-256 key length"))?;
            let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
            let sealed = cipher
                .encrypt(&nonce, plaintext)
                .map_err(|_| anyhow!("AES-256-GCM encryption failed"))?;
            (nonce.to_vec(), sealed)
        }
    };

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Encrypts whole files in memory with AES-GCM
#[derive(Debug, Clone, Default)]
pub struct AesGcmEncryptor;

impl AesGcmEncryptor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl IEncryptor for AesGcmEncryptor {
    #[instrument(skip(self, key), fields(input = %input.display(), output = %output.display()))]
    async fn encrypt(&self, input: &Path, output: &Path, key: &str, method: &str) -> Result<()> {
        let method = Method::parse(method)?;
        if key.is_empty() {
            bail!("encryption key must not be empty");
        }

        let plaintext = tokio::fs::read(input)
            .await
            .with_context(|| format!("Failed to read {}", input.display()))?;
        let key = key.to_string();
        let sealed = tokio::task::spawn_blocking(move || seal(method, &key, &plaintext))
            .await
            .context("Encryption task panicked")??;

        tokio::fs::write(output, &sealed)
            .await
            .with_context(|| format!("Failed to write {}", output.display()))?;
        debug!(bytes = sealed.len(), ?method, "file encrypted");
        Ok(())
    }
}
