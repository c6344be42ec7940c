//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for identifiers and paths.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::errors::DomainError;

/// Length of a lowercase hex-encoded SHA-256 digest
const SHA256_HEX_LEN: usize = 64;

fn is_sha256_hex(s: &str) -> bool {
    s.len() == SHA256_HEX_LEN
        && s
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

// ============================================================================
// WatchId
// ============================================================================

/// Stable identifier of a watch
///
/// Derived deterministically from the canonicalized local root path, so
/// the same directory always maps to the same watch across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WatchId(String);

impl WatchId {
    /// Derive the identifier for a canonicalized local root
    #[must_use]
    pub fn for_path(canonical_root: &Path) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(canonical_root.to_string_lossy().as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form used in log lines and listings
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl Display for WatchId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WatchId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !is_sha256_hex(s) {
            return Err(DomainError::InvalidId(format!("Invalid watch id: {s}")));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for WatchId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if !is_sha256_hex(&s) {
            return Err(DomainError::InvalidId(format!("Invalid watch id: {s}")));
        }
        Ok(Self(s))
    }
}

impl From<WatchId> for String {
    fn from(id: WatchId) -> Self {
        id.0
    }
}

// ============================================================================
// Path types
// ============================================================================

/// A file path relative to a watch root, always using `/` as separator
///
/// Guaranteed non-empty, not absolute, and free of `.`/`..` segments.
/// Used as the key of the per-watch file state map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelativePath(String);

impl RelativePath {
    /// Create a new RelativePath from a forward-slash string
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPath` if the path is empty, absolute,
    /// or contains empty, `.` or `..` segments
    pub fn new(path: impl Into<String>) -> Result<Self, DomainError> {
        let path = path.into();
        if path.is_empty() || path.starts_with('/') {
            return Err(DomainError::InvalidPath(format!(
                "Relative path must be non-empty and not start with '/': {path}"
            )));
        }
        if path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(DomainError::InvalidPath(format!(
                "Relative path contains an invalid segment: {path}"
            )));
        }
        Ok(Self(path))
    }

    /// Compute the relative path of `file` under `root`
    ///
    /// Platform separators are converted to `/`.
    ///
    /// # Errors
    /// Returns `DomainError::PathNotInRoot` if `file` is not below `root`
    pub fn from_root(root: &Path, file: &Path) -> Result<Self, DomainError> {
        let stripped = file.strip_prefix(root).map_err(|_| {
            DomainError::PathNotInRoot(format!(
                "{} is not within {}",
                file.display(),
                root.display()
            ))
        })?;

        let mut segments = Vec::new();
        for component in stripped.components() {
            match component {
                Component::Normal(c) => segments.push(c.to_string_lossy().into_owned()),
                Component::CurDir => {}
                other => {
                    return Err(DomainError::InvalidPath(format!(
                        "Unexpected component {other:?} in {}",
                        file.display()
                    )))
                }
            }
        }

        Self::new(segments.join("/"))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory part of the path, `None` for top-level files
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(dir, _)| dir)
    }

    /// Final segment of the path
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0
            .rsplit_once('/')
            .map_or(self.0.as_str(), |(_, name)| name)
    }
}

impl Display for RelativePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A remote storage path (must start with /)
///
/// Stored in lexically cleaned form: no duplicate slashes, no trailing
/// slash (except the root itself), `.` removed and `..` resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemotePath(String);

impl RemotePath {
    /// Create a new RemotePath
    ///
    /// # Errors
    /// Returns error if path doesn't start with / or climbs above the root
    pub fn new(path: impl Into<String>) -> Result<Self, DomainError> {
        let path = path.into();
        if !path.starts_with('/') {
            return Err(DomainError::InvalidRemotePath(format!(
                "Remote path must start with '/': {path}"
            )));
        }
        Self::clean(&path).map(Self)
    }

    /// Create the root path "/"
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Destination directory for a file whose relative directory is `rel_dir`
    ///
    /// `None`, `""` and `"."` collapse to this path unchanged; anything else
    /// is appended with `/` and cleaned.
    ///
    /// # Errors
    /// Returns error if `rel_dir` climbs above the remote root
    pub fn join_dir(&self, rel_dir: Option<&str>) -> Result<Self, DomainError> {
        match rel_dir {
            None | Some("") | Some(".") => Ok(self.clone()),
            Some(dir) => Self::clean(&format!("{}/{dir}", self.0)).map(Self),
        }
    }

    fn clean(path: &str) -> Result<String, DomainError> {
        let mut parts: Vec<&str> = Vec::new();
        for segment in path.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if parts.pop().is_none() {
                        return Err(DomainError::InvalidRemotePath(format!(
                            "Remote path escapes root: {path}"
                        )));
                    }
                }
                other => parts.push(other),
            }
        }
        Ok(format!("/{}", parts.join("/")))
    }
}

impl Display for RemotePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RemotePath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemotePath> for String {
    fn from(path: RemotePath) -> Self {
        path.0
    }
}

// ============================================================================
// ContentHash
// ============================================================================

/// Lowercase hex SHA-256 digest of a file's content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Create a new ContentHash
    ///
    /// # Errors
    /// Returns `DomainError::InvalidHash` unless `hash` is 64 lowercase hex chars
    pub fn new(hash: impl Into<String>) -> Result<Self, DomainError> {
        let hash = hash.into();
        if !is_sha256_hex(&hash) {
            return Err(DomainError::InvalidHash(hash));
        }
        Ok(Self(hash))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}
