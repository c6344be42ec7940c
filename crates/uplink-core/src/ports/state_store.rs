//! State store port (driven/secondary port)
//!
//! Persists the [`Registry`] between runs.
//!
//! ## Design Notes
//!
//! - `load` on a store that has never been written returns an empty
//!   registry; unreadable, unparseable or invalid content is an error.
//! - A failed `save` means the last mutation is not durable. Callers
//!   surface the failure and reload before the next mutation.

use crate::domain::registry::Registry;

/// Port trait for registry persistence
#[async_trait::async_trait]
pub trait IStateStore: Send + Sync {
    /// Loads the registry, creating an empty one if none exists
    ///
    /// # Errors
    /// Returns an error if persisted state exists but cannot be parsed
    async fn load(&self) -> anyhow::Result<Registry>;

    /// Replaces the persisted registry with `registry`
    ///
    /// # Errors
    /// Returns an error if the state could not be written durably
    async fn save(&self, registry: &Registry) -> anyhow::Result<()>;
}
