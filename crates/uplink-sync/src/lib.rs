//! Uplink Sync - Watch scheduling and upload pipeline
//!
//! Provides:
//! - A registry of watches with add/delete/list/start/stop operations
//! - One periodic task per running watch
//! - Incremental change detection with gitignore-style rules
//! - Encryption, name anonymization and archive bundling before upload
//!
//! ## Modules
//!
//! - [`registry`] - Public watch registry API
//! - [`scheduler`] - Per-watch periodic task
//! - [`engine`] - Incremental and bundle passes
//! - [`detector`] - Per-file upload/skip decision
//! - [`patterns`] - Ignore-rule compiler and matcher
//! - [`fingerprint`] - Content and metadata fingerprints
//! - [`transform`] - Encryption and anonymized naming of artifacts
//! - [`bundle`] - Deflate archive of a whole tree
//! - [`store`] - JSON and in-memory registry persistence
//! - [`filesystem`] - Local tree walker and mirror uploader adapters
//! - [`crypto`] - AES-GCM encryptor adapter

pub mod bundle;
pub mod crypto;
pub mod detector;
pub mod engine;
pub mod filesystem;
pub mod fingerprint;
pub mod patterns;
pub mod registry;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod transform;

use std::path::PathBuf;

use thiserror::Error;

pub use engine::{PassReport, SyncContext};
pub use registry::{NewWatch, WatchRegistry, WatchStatus};

/// Errors returned by the watch registry API
#[derive(Debug, Error)]
pub enum SyncError {
    /// A watch already exists for this local root
    #[error("Watch already exists for {0}")]
    AlreadyExists(PathBuf),

    /// No watch is configured for this local root
    #[error("Watch not found: {0}")]
    NotFound(PathBuf),

    /// The watch already has an active task or pass
    #[error("Watch already running: {0}")]
    AlreadyRunning(PathBuf),

    /// The watch has no active task
    #[error("Watch not running: {0}")]
    NotRunning(PathBuf),

    /// A task or pass refers to a watch that has since been deleted
    #[error("No watch with id {0}")]
    UnknownWatch(uplink_core::domain::WatchId),

    /// The local root is missing or not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The mutation could not be saved and did not take effect
    #[error("State not durable: {0:#}")]
    Persistence(anyhow::Error),

    /// The persisted state could not be loaded
    #[error("Failed to load state: {0:#}")]
    StateCorrupt(anyhow::Error),

    /// An I/O error occurred during file operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A domain-level error propagated from uplink-core
    #[error("Domain error: {0}")]
    DomainError(#[from] uplink_core::domain::errors::DomainError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::AlreadyRunning(PathBuf::from("/data"));
        assert_eq!(err.to_string(), "Watch already running: /data");

        let err = SyncError::Persistence(anyhow::anyhow!("disk full"));
        assert_eq!(err.to_string(), "State not durable: disk full");
    }

    #[test]
    fn test_domain_error_converts() {
        let domain = uplink_core::domain::DomainError::InvalidPath("x".to_string());
        let err: SyncError = domain.into();
        assert!(matches!(err, SyncError::DomainError(_)));
    }
}
