//! Content and metadata fingerprints
//!
//! Content hashing streams the file through SHA-256 on the blocking pool so
//! large files never sit in memory and never stall the async workers.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uplink_core::domain::{ContentHash, FileState, FingerprintMode};

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// SHA-256 of the file at `path`
///
/// # Errors
/// Returns an error if the file cannot be opened or read
pub async fn content_hash(path: &Path) -> Result<ContentHash> {
    let owned = path.to_path_buf();
    let digest = tokio::task::spawn_blocking(move || -> Result<String> {
        let mut file = std::fs::File::open(&owned)
            .with_context(|| format!("Failed to open {}", owned.display()))?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; HASH_BUFFER_SIZE];
        loop {
            let n = file
                .read(&mut buf)
                .with_context(|| format!("Failed to read {}", owned.display()))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    })
    .await
    .context("Hashing task panicked")??;

    Ok(ContentHash::new(digest)?)
}

/// Fingerprint of the file at `path` under `mode`
///
/// Modification time and size are always recorded; the digest only in
/// content mode.
///
/// # Errors
/// Returns an error if the file's metadata or content cannot be read
pub async fn fingerprint(path: &Path, mode: FingerprintMode) -> Result<FileState> {
    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("Failed to stat {}", path.display()))?;
    let modified: DateTime<Utc> = metadata
        .modified()
        .with_context(|| format!("No modification time for {}", path.display()))?
        .into();

    let hash = match mode {
        FingerprintMode::Content => Some(content_hash(path).await?),
        FingerprintMode::Metadata => None,
    };

    Ok(FileState {
        mod_time: modified.timestamp(),
        size: metadata.len(),
        hash,
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_content_hash_known_value() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hello.txt");
        tokio::fs::write(&path, b"hello").await.unwrap();

        let hash = content_hash(&path).await.unwrap();
        assert_eq!(
            hash.as_str(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[tokio::test]
    async fn test_content_hash_streams_large_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("big.bin");
        let data = vec![7u8; HASH_BUFFER_SIZE * 3 + 17];
        tokio::fs::write(&path, &data).await.unwrap();

        let mut hasher = Sha256::new();
        hasher.update(&data);
        let expected = format!("{:x}", hasher.finalize());

        assert_eq!(content_hash(&path).await.unwrap().as_str(), expected);
    }

    #[tokio::test]
    async fn test_fingerprint_modes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        tokio::fs::write(&path, b"abc").await.unwrap();

        let content = fingerprint(&path, FingerprintMode::Content).await.unwrap();
        assert_eq!(content.size, 3);
        assert!(content.hash.is_some());
        assert!(content.mod_time > 0);

        let meta = fingerprint(&path, FingerprintMode::Metadata).await.unwrap();
        assert_eq!(meta.size, 3);
        assert!(meta.hash.is_none());
        assert_eq!(meta.mod_time, content.mod_time);
    }

    #[tokio::test]
    async fn test_fingerprint_missing_file() {
        let tmp = TempDir::new().unwrap();
        let result = fingerprint(&tmp.path().join("gone"), FingerprintMode::Content).await;
        assert!(result.is_err());
    }
}
