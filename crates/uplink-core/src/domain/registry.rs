//! Persisted registry of watches
//!
//! The registry is the whole durable state: one record mapping each
//! [`WatchId`] to its [`WatchEntry`]. Serialized as
//! `{"watches": {"<id>": {...}}}`.
//!
//! Deserialization applies the same checks as construction: every entry
//! must pass [`WatchEntry::validate`] and be keyed by its own derived id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::WatchId;
use super::watch::WatchEntry;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RegistryRecord")]
pub struct Registry {
    pub watches: BTreeMap<WatchId, WatchEntry>,
}

/// Unchecked on-disk shape of [`Registry`]
#[derive(Deserialize)]
struct RegistryRecord {
    #[serde(default)]
    watches: BTreeMap<WatchId, WatchEntry>,
}

impl TryFrom<RegistryRecord> for Registry {
    type Error = DomainError;

    fn try_from(record: RegistryRecord) -> Result<Self, Self::Error> {
        for (id, entry) in &record.watches {
            entry.validate()?;
            if *id != entry.id() {
                return Err(DomainError::InvalidId(format!(
                    "watch {id} is stored under the wrong key for {}",
                    entry.local.display()
                )));
            }
        }
        Ok(Self {
            watches: record.watches,
        })
    }
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: &WatchId) -> Option<&WatchEntry> {
        self.watches.get(id)
    }

    pub fn get_mut(&mut self, id: &WatchId) -> Option<&mut WatchEntry> {
        self.watches.get_mut(id)
    }

    #[must_use]
    pub fn contains(&self, id: &WatchId) -> bool {
        self.watches.contains_key(id)
    }

    /// Insert an entry under its derived id, returning any previous entry
    pub fn insert(&mut self, entry: WatchEntry) -> Option<WatchEntry> {
        self.watches.insert(entry.id(), entry)
    }

    pub fn remove(&mut self, id: &WatchId) -> Option<WatchEntry> {
        self.watches.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&WatchId, &WatchEntry)> {
        self.watches.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.watches.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }
}
