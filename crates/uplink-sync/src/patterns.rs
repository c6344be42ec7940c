//! Ignore-rule compiler and matcher
//!
//! Rules follow a gitignore-like syntax, one per line:
//!
//! ```text
//! # comment
//! *.log            ignore every .log file, at any depth
//! !important.log   ...except this one
//! /build           only `build` directly under the root
//! cache/           directories named `cache`
//! docs/**/draft*   `**` crosses directory boundaries
//! ```
//!
//! Blank lines and `#` lines are skipped. When several rules match a path
//! the last one wins. Each rule is compiled to an anchored [`Regex`] once
//! and matched against forward-slash relative paths.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, warn};

/// One compiled ignore rule
#[derive(Debug, Clone)]
pub struct IgnoreRule {
    raw: String,
    regex: Regex,
    negated: bool,
    anchored: bool,
    dir_only: bool,
}

impl IgnoreRule {
    /// Compile a single non-comment line, returning `None` for lines that
    /// carry no pattern
    pub fn parse(line: &str) -> Option<Self> {
        let mut body = line.trim();
        if body.is_empty() || body.starts_with('#') {
            return None;
        }

        let negated = body.starts_with('!');
        if negated {
            body = body[1..].trim();
        }
        let anchored = body.starts_with('/');
        if anchored {
            body = &body[1..];
        }
        let dir_only = body.ends_with('/');
        if dir_only {
            body = &body[..body.len() - 1];
        }
        if body.is_empty() {
            return None;
        }

        let pattern = glob_to_regex(body, anchored);
        match Regex::new(&pattern) {
            Ok(regex) => Some(Self {
                raw: body.to_string(),
                regex,
                negated,
                anchored,
                dir_only,
            }),
            Err(err) => {
                warn!(rule = %line, error = %err, "Skipping ignore rule that does not compile");
                None
            }
        }
    }

    /// The glob body without its `!`, `/` prefix or `/` suffix
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    pub fn is_dir_only(&self) -> bool {
        self.dir_only
    }

    fn matches(&self, rel: &str, is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }
        self.regex.is_match(rel)
    }
}

/// Translate a glob body into an anchored regular expression
///
/// `**` becomes `.*`, `*` becomes `[^/]*`, `?` becomes `[^/]` and every
/// other character is matched literally. Unanchored rules may match the
/// whole path or any suffix starting at a segment boundary.
fn glob_to_regex(glob: &str, anchored: bool) -> String {
    let mut body = String::with_capacity(glob.len() * 2);
    let mut chars = glob.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                body.push_str(".*");
            }
            '*' => body.push_str("[^/]*"),
            '?' => body.push_str("[^/]"),
            other => body.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }

    if anchored {
        format!("^{body}$")
    } else {
        format!("^(.*/)?{body}$")
    }
}

/// Ordered set of compiled ignore rules for one watch
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<IgnoreRule>,
}

impl IgnoreRules {
    /// A rule set that ignores nothing
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compile every rule in `text`
    pub fn parse(text: &str) -> Self {
        Self {
            rules: text.lines().filter_map(IgnoreRule::parse).collect(),
        }
    }

    /// Read and compile the rule file at `path`
    ///
    /// # Errors
    /// Returns an error if the file cannot be read
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read ignore rules: {}", path.display()))?;
        let rules = Self::parse(&text);
        debug!(path = %path.display(), rules = rules.len(), "Loaded ignore rules");
        Ok(rules)
    }

    /// Load the rules that apply to a watch
    ///
    /// A missing source means nothing is ignored. An explicit source that
    /// exists but cannot be read is logged and treated the same way.
    pub async fn load_for_watch(
        root: &Path,
        explicit: Option<&Path>,
        default_name: &str,
    ) -> Self {
        let source = resolve_source(root, explicit, default_name);
        match tokio::fs::try_exists(&source).await {
            Ok(true) => match Self::load(&source).await {
                Ok(rules) => rules,
                Err(err) => {
                    warn!(path = %source.display(), error = %format!("{err:#}"), "Ignoring unreadable ignore file");
                    Self::empty()
                }
            },
            Ok(false) => {
                if explicit.is_some() {
                    warn!(path = %source.display(), "Configured ignore file does not exist");
                }
                Self::empty()
            }
            Err(err) => {
                warn!(path = %source.display(), error = %err, "Cannot stat ignore file");
                Self::empty()
            }
        }
    }

    /// Whether `rel` (forward-slash, relative to the root) is ignored
    ///
    /// Every rule is evaluated in order; the last matching rule decides.
    /// Directory-only rules are skipped unless `is_dir` is set.
    pub fn is_ignored(&self, rel: &str, is_dir: bool) -> bool {
        let mut ignored = false;
        for rule in &self.rules {
            if rule.matches(rel, is_dir) {
                ignored = !rule.negated;
            }
        }
        ignored
    }

    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Location of the ignore-rule file for a watch rooted at `root`
///
/// Relative explicit sources resolve against `root`, absolute ones are
/// used as-is, otherwise `default_name` inside `root`.
pub fn resolve_source(root: &Path, explicit: Option<&Path>, default_name: &str) -> PathBuf {
    match explicit {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => root.join(path),
        None => root.join(default_name),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    // ------------------------------------------------------------------------
    // Rule parsing
    // ------------------------------------------------------------------------

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let rules = IgnoreRules::parse("# comment\n\n   \n*.tmp\n");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.rules()[0].raw(), "*.tmp");
    }

    #[test]
    fn test_parse_flags() {
        let rule = IgnoreRule::parse("!/build/").unwrap();
        assert!(rule.is_negated());
        assert!(rule.is_anchored());
        assert!(rule.is_dir_only());
        assert_eq!(rule.raw(), "build");

        assert!(IgnoreRule::parse("!").is_none());
        assert!(IgnoreRule::parse("/").is_none());
    }

    #[test]
    fn test_glob_to_regex() {
        assert_eq!(glob_to_regex("*.log", true), r"^[^/]*\.log$");
        assert_eq!(glob_to_regex("a/**/b", false), r"^(.*/)?a/.*/b$");
        assert_eq!(glob_to_regex("f?o", true), r"^f[^/]o$");
    }

    // ------------------------------------------------------------------------
    // Matching
    // ------------------------------------------------------------------------

    #[test]
    fn test_negation_last_match_wins() {
        let rules = IgnoreRules::parse("*.log\n!important.log\n");

        assert!(rules.is_ignored("debug.log", false));
        assert!(rules.is_ignored("nested/debug.log", false));
        assert!(!rules.is_ignored("important.log", false));
        assert!(!rules.is_ignored("nested/important.log", false));
        assert!(!rules.is_ignored("notes.txt", false));
    }

    #[test]
    fn test_later_rule_can_reignore() {
        let rules = IgnoreRules::parse("*.log\n!important.log\nimportant.log\n");
        assert!(rules.is_ignored("important.log", false));
    }

    #[test]
    fn test_anchored_matches_from_root_only() {
        let rules = IgnoreRules::parse("/secret.txt\n");

        assert!(rules.is_ignored("secret.txt", false));
        assert!(!rules.is_ignored("sub/secret.txt", false));
    }

    #[test]
    fn test_unanchored_matches_segment_suffix() {
        let rules = IgnoreRules::parse("cache/data.bin\n");

        assert!(rules.is_ignored("cache/data.bin", false));
        assert!(rules.is_ignored("a/b/cache/data.bin", false));
        assert!(!rules.is_ignored("mycache/data.bin", false));
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let rules = IgnoreRules::parse("/docs/*.md\n");

        assert!(rules.is_ignored("docs/readme.md", false));
        assert!(!rules.is_ignored("docs/sub/readme.md", false));
    }

    #[test]
    fn test_double_star_crosses_segments() {
        let rules = IgnoreRules::parse("/docs/**.md\n");

        assert!(rules.is_ignored("docs/readme.md", false));
        assert!(rules.is_ignored("docs/sub/readme.md", false));
    }

    #[test]
    fn test_question_mark_single_char() {
        let rules = IgnoreRules::parse("file?.txt\n");

        assert!(rules.is_ignored("file1.txt", false));
        assert!(!rules.is_ignored("file10.txt", false));
        assert!(!rules.is_ignored("file/.txt", false));
    }

    #[test]
    fn test_dir_only_rules_skip_files() {
        let rules = IgnoreRules::parse("build/\n");

        assert!(rules.is_ignored("build", true));
        assert!(!rules.is_ignored("build", false));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let rules = IgnoreRules::parse("a+b(1).txt\n");

        assert!(rules.is_ignored("a+b(1).txt", false));
        assert!(!rules.is_ignored("aab1.txt", false));
    }

    #[test]
    fn test_empty_rules_ignore_nothing() {
        assert!(!IgnoreRules::empty().is_ignored("anything", false));
    }

    // ------------------------------------------------------------------------
    // Source resolution and loading
    // ------------------------------------------------------------------------

    #[test]
    fn test_resolve_source() {
        let root = Path::new("/data/root");

        assert_eq!(
            resolve_source(root, None, ".uplinkignore"),
            PathBuf::from("/data/root/.uplinkignore")
        );
        assert_eq!(
            resolve_source(root, Some(Path::new("conf/ignore")), ".uplinkignore"),
            PathBuf::from("/data/root/conf/ignore")
        );
        assert_eq!(
            resolve_source(root, Some(Path::new("/etc/ignore")), ".uplinkignore"),
            PathBuf::from("/etc/ignore")
        );
    }

    #[tokio::test]
    async fn test_load_for_watch_default_file() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join(".uplinkignore"), "*.tmp\n")
            .await
            .unwrap();

        let rules = IgnoreRules::load_for_watch(tmp.path(), None, ".uplinkignore").await;
        assert!(rules.is_ignored("x.tmp", false));
    }

    #[tokio::test]
    async fn test_load_for_watch_missing_source_is_empty() {
        let tmp = TempDir::new().unwrap();

        let rules =
            IgnoreRules::load_for_watch(tmp.path(), Some(Path::new("nope")), ".uplinkignore")
                .await;
        assert!(rules.is_empty());
    }

    #[tokio::test]
    async fn test_load_reports_missing_file() {
        let tmp = TempDir::new().unwrap();
        assert!(IgnoreRules::load(&tmp.path().join("missing")).await.is_err());
    }
}
