//! Per-file upload/skip decision for incremental passes
//!
//! For each walked path the detector, in order:
//! 1. skips directories,
//! 2. derives the forward-slash relative path,
//! 3. fingerprints the file,
//! 4. compares with the stored [`FileState`] (equal means unchanged),
//! 5. consults the ignore rules.
//!
//! Ignore decisions are never recorded in state, so an ignored file is
//! re-checked on every pass. The rules themselves are compiled once per
//! watch and kept for the life of the process; edits to the rule file take
//! effect after a restart.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use uplink_core::domain::{FileState, FingerprintMode, RelativePath};

use crate::fingerprint;
use crate::patterns::IgnoreRules;

/// Outcome of inspecting one walked path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The path is a directory
    Directory,
    /// Fingerprint equals the stored state
    Unchanged(RelativePath),
    /// Changed or new, but excluded by the ignore rules
    Ignored(RelativePath),
    /// Must be uploaded; `state` is recorded once the upload succeeds
    Changed { rel: RelativePath, state: FileState },
}

/// Change detector bound to one watch's root, state and rules
pub struct ChangeDetector<'a> {
    root: &'a Path,
    mode: FingerprintMode,
    files: &'a BTreeMap<RelativePath, FileState>,
    rules: &'a IgnoreRules,
}

impl<'a> ChangeDetector<'a> {
    pub fn new(
        root: &'a Path,
        mode: FingerprintMode,
        files: &'a BTreeMap<RelativePath, FileState>,
        rules: &'a IgnoreRules,
    ) -> Self {
        Self {
            root,
            mode,
            files,
            rules,
        }
    }

    /// Decide what to do with `path`
    ///
    /// # Errors
    /// Returns an error if the path vanished, lies outside the root, or
    /// cannot be fingerprinted
    pub async fn inspect(&self, path: &Path) -> Result<Decision> {
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        if metadata.is_dir() {
            return Ok(Decision::Directory);
        }

        let rel = RelativePath::from_root(self.root, path)?;
        let current = fingerprint::fingerprint(path, self.mode).await?;

        if let Some(previous) = self.files.get(&rel) {
            if previous.same_fingerprint(&current, self.mode) {
                return Ok(Decision::Unchanged(rel));
            }
        }

        if self.rules.is_ignored(rel.as_str(), false) {
            return Ok(Decision::Ignored(rel));
        }

        Ok(Decision::Changed {
            rel,
            state: current,
        })
    }
}
