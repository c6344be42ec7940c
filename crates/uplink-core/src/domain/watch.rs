//! Watch entries and per-file state
//!
//! A [`WatchEntry`] is one configured (local root, remote destination)
//! unit. It carries everything that must survive a restart: the transform
//! settings, the last uploaded fingerprint of every file and the
//! anonymized-name mapping. Runtime handles (cancellation, running flag,
//! compiled ignore rules) live elsewhere, keyed by the same [`WatchId`].

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{ContentHash, RelativePath, RemotePath, WatchId};

/// How a watch uploads its tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Per-file change detection and selective upload
    #[default]
    Incremental,
    /// Whole-tree archive uploaded unconditionally every pass
    Bundle,
}

/// How change detection fingerprints a file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintMode {
    /// SHA-256 of the file content
    #[default]
    Content,
    /// Modification time and size only
    Metadata,
}

/// Key and cipher used to encrypt artifacts before upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionSettings {
    pub key: String,
    pub method: String,
}

/// Last uploaded fingerprint of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
    /// Modification time, seconds since the Unix epoch
    pub mod_time: i64,
    /// Size in bytes
    pub size: u64,
    /// Content digest; absent in metadata mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<ContentHash>,
}

impl FileState {
    /// Whether `other` describes the same file content under `mode`
    ///
    /// Content mode compares digests only, so a touched but unmodified
    /// file is not re-uploaded. Metadata mode compares time and size.
    #[must_use]
    pub fn same_fingerprint(&self, other: &FileState, mode: FingerprintMode) -> bool {
        match mode {
            FingerprintMode::Content => match (&self.hash, &other.hash) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            FingerprintMode::Metadata => self.mod_time == other.mod_time && self.size == other.size,
        }
    }
}

/// One configured synchronization unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEntry {
    /// Canonicalized local root
    pub local: PathBuf,
    /// Remote destination root
    pub remote: RemotePath,
    /// Seconds between passes
    pub interval_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionSettings>,
    /// Explicit ignore-rule source; relative paths resolve against `local`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_file: Option<PathBuf>,
    #[serde(default)]
    pub anonymize_names: bool,
    #[serde(default)]
    pub mode: SyncMode,
    #[serde(default)]
    pub fingerprint: FingerprintMode,
    /// Anonymized bundle name, minted once on the first bundle pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_name: Option<String>,
    #[serde(default)]
    pub files: BTreeMap<RelativePath, FileState>,
    /// Anonymized name -> original relative path
    #[serde(default)]
    pub name_map: BTreeMap<String, RelativePath>,
}

impl WatchEntry {
    /// Create a new incremental, unencrypted watch
    ///
    /// # Errors
    /// Returns `DomainError::ValidationFailed` if `interval_secs` is zero
    /// or `local` is not absolute
    pub fn new(local: PathBuf, remote: RemotePath, interval_secs: u64) -> Result<Self, DomainError> {
        let entry = Self {
            local,
            remote,
            interval_secs,
            encryption: None,
            ignore_file: None,
            anonymize_names: false,
            mode: SyncMode::Incremental,
            fingerprint: FingerprintMode::Content,
            bundle_name: None,
            files: BTreeMap::new(),
            name_map: BTreeMap::new(),
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Check the invariants `new` enforces, for entries read from storage
    ///
    /// # Errors
    /// Returns `DomainError::ValidationFailed` if `interval_secs` is zero
    /// or `local` is not absolute
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.interval_secs == 0 {
            return Err(DomainError::ValidationFailed(
                "interval must be at least 1 second".to_string(),
            ));
        }
        if !self.local.is_absolute() {
            return Err(DomainError::ValidationFailed(format!(
                "local root must be absolute: {}",
                self.local.display()
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_encryption(mut self, encryption: Option<EncryptionSettings>) -> Self {
        self.encryption = encryption;
        self
    }

    #[must_use]
    pub fn with_ignore_file(mut self, ignore_file: Option<PathBuf>) -> Self {
        self.ignore_file = ignore_file;
        self
    }

    #[must_use]
    pub fn with_anonymized_names(mut self, enabled: bool) -> Self {
        self.anonymize_names = enabled;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: FingerprintMode) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    /// Identifier derived from the local root
    #[must_use]
    pub fn id(&self) -> WatchId {
        WatchId::for_path(&self.local)
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Fingerprint mode actually used by change detection
    ///
    /// Metadata mode is only honored for unencrypted watches.
    #[must_use]
    pub fn effective_fingerprint(&self) -> FingerprintMode {
        match (self.fingerprint, &self.encryption) {
            (FingerprintMode::Metadata, None) => FingerprintMode::Metadata,
            _ => FingerprintMode::Content,
        }
    }

    /// Whether uploaded names are replaced by random identifiers
    ///
    /// Anonymization only applies to encrypted watches.
    #[must_use]
    pub fn anonymizes(&self) -> bool {
        self.anonymize_names && self.encryption.is_some()
    }

    /// Reverse index of `name_map`: relative path -> anonymized name
    #[must_use]
    pub fn names_by_path(&self) -> HashMap<RelativePath, String> {
        self.name_map
            .iter()
            .map(|(name, rel)| (rel.clone(), name.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> WatchEntry {
        WatchEntry::new(
            PathBuf::from("/data/photos"),
            RemotePath::new("/backup/photos").unwrap(),
            60,
        )
        .unwrap()
    }

    fn encryption() -> Option<EncryptionSettings> {
        Some(EncryptionSettings {
            key: "secret".to_string(),
            method: "aes-256-gcm".to_string(),
        })
    }

    #[test]
    fn test_new_rejects_zero_interval() {
        let result = WatchEntry::new(PathBuf::from("/data"), RemotePath::root(), 0);
        assert!(matches!(result, Err(DomainError::ValidationFailed(_))));
    }

    #[test]
    fn test_new_rejects_relative_local() {
        let result = WatchEntry::new(PathBuf::from("data"), RemotePath::root(), 10);
        assert!(result.is_err());
    }

    #[test]
    fn test_id_matches_local_root() {
        let e = entry();
        assert_eq!(e.id(), WatchId::for_path(&e.local));
    }

    #[test]
    fn test_metadata_fingerprint_requires_no_encryption() {
        let plain = entry().with_fingerprint(FingerprintMode::Metadata);
        assert_eq!(plain.effective_fingerprint(), FingerprintMode::Metadata);

        let encrypted = plain.with_encryption(encryption());
        assert_eq!(encrypted.effective_fingerprint(), FingerprintMode::Content);
    }

    #[test]
    fn test_anonymize_requires_key() {
        let e = entry().with_anonymized_names(true);
        assert!(!e.anonymizes());
        assert!(e.with_encryption(encryption()).anonymizes());
    }

    #[test]
    fn test_same_fingerprint_content_ignores_mtime() {
        let hash = ContentHash::new("0".repeat(64)).unwrap();
        let a = FileState {
            mod_time: 1,
            size: 10,
            hash: Some(hash.clone()),
        };
        let b = FileState {
            mod_time: 2,
            size: 10,
            hash: Some(hash),
        };
        assert!(a.same_fingerprint(&b, FingerprintMode::Content));
        assert!(!a.same_fingerprint(&b, FingerprintMode::Metadata));
    }

    #[test]
    fn test_same_fingerprint_content_without_hash_differs() {
        let a = FileState {
            mod_time: 1,
            size: 10,
            hash: None,
        };
        assert!(!a.same_fingerprint(&a.clone(), FingerprintMode::Content));
        assert!(a.same_fingerprint(&a.clone(), FingerprintMode::Metadata));
    }

    #[test]
    fn test_names_by_path_reverses_mapping() {
        let mut e = entry();
        let rel = RelativePath::new("sub/b.txt").unwrap();
        e.name_map.insert("uuid-1".to_string(), rel.clone());

        let index = e.names_by_path();
        assert_eq!(index.get(&rel).map(String::as_str), Some("uuid-1"));
    }

    #[test]
    fn test_serde_defaults_for_optional_fields() {
        let json = r#"{"local":"/data","remote":"/r","interval_secs":5}"#;
        let e: WatchEntry = serde_json::from_str(json).unwrap();
        assert_eq!(e.mode, SyncMode::Incremental);
        assert_eq!(e.fingerprint, FingerprintMode::Content);
        assert!(e.files.is_empty());
        assert!(e.name_map.is_empty());
        assert!(e.encryption.is_none());
    }
}
