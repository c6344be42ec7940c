//! Domain error types
//!
//! Validation failures raised while constructing domain values.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid relative path (absolute, empty, or escaping the root)
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Path is not within the watched root
    #[error("Path not within watch root: {0}")]
    PathNotInRoot(String),

    /// Invalid remote path format
    #[error("Invalid remote path: {0}")]
    InvalidRemotePath(String),

    /// Invalid content hash format (expected lowercase hex SHA-256)
    #[error("Invalid hash format: {0}")]
    InvalidHash(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidPath("../escape".to_string());
        assert_eq!(err.to_string(), "Invalid path: ../escape");

        let err = DomainError::ValidationFailed("interval must be at least 1".to_string());
        assert_eq!(
            err.to_string(),
            "Validation failed: interval must be at least 1"
        );
    }

    #[test]
    fn test_error_equality() {
        let err1 = DomainError::InvalidRemotePath("x".to_string());
        let err2 = DomainError::InvalidRemotePath("x".to_string());
        let err3 = DomainError::InvalidRemotePath("y".to_string());

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }
}
