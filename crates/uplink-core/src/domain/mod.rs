//! Domain entities and business logic
//!
//! This module contains the core domain types for uplink:
//! - Newtypes for identifiers and validated paths
//! - Watch entries with their per-file state and name mapping
//! - The persisted registry of all watches
//! - Domain-specific error types

pub mod errors;
pub mod newtypes;
pub mod registry;
pub mod watch;

// Re-export commonly used types
pub use errors::DomainError;
pub use newtypes::*;
pub use registry::Registry;
pub use watch::{EncryptionSettings, FileState, FingerprintMode, SyncMode, WatchEntry};
