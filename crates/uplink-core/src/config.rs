//! Configuration module for uplink.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for uplink.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub state: StateConfig,
    pub sync: SyncConfig,
    pub upload: UploadConfig,
    pub logging: LoggingConfig,
}

/// Where the watch registry is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// JSON file holding every watch and its per-file state.
    pub file: PathBuf,
}

/// Defaults applied to new watches and passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between passes when `watch add` is given no interval.
    pub default_interval: u64,
    /// Ignore-rule file looked up inside each watch root.
    pub ignore_file_name: String,
    /// Scratch directory for encrypted copies and bundle archives.
    pub temp_dir: PathBuf,
    /// Cipher used when a key is given without a method.
    pub default_method: String,
}

/// Settings for the bundled mirror uploader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Local directory standing in for the remote storage root.
    pub mirror_root: PathBuf,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter level when neither `RUST_LOG` nor `-v` is given.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/uplink/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        config_dir().join("config.yaml")
    }
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("uplink")
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            file: config_dir().join("sync_state.json"),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_interval: 60,
            ignore_file_name: ".uplinkignore".to_string(),
            temp_dir: std::env::temp_dir().join("uplink"),
            default_method: "aes-256-gcm".to_string(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            mirror_root: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("uplink")
                .join("remote"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.default_interval"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `sync.default_method`.
pub const SUPPORTED_METHODS: &[&str] = &["aes-128-gcm", "aes-256-gcm"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- state ---
        if self.state.file.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "state.file".into(),
                message: "must not be empty".into(),
            });
        }

        // --- sync ---
        if self.sync.default_interval == 0 {
            errors.push(ValidationError {
                field: "sync.default_interval".into(),
                message: "must be greater than 0".into(),
            });
        }
        let name = self.sync.ignore_file_name.as_str();
        if name.is_empty() || name.contains('/') {
            errors.push(ValidationError {
                field: "sync.ignore_file_name".into(),
                message: format!("must be a plain file name, got '{name}'"),
            });
        }
        if self.sync.temp_dir.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "sync.temp_dir".into(),
                message: "must not be empty".into(),
            });
        }
        if !SUPPORTED_METHODS.contains(&self.sync.default_method.as_str()) {
            errors.push(ValidationError {
                field: "sync.default_method".into(),
                message: format!(
                    "invalid method '{}', expected one of: {}",
                    self.sync.default_method,
                    SUPPORTED_METHODS.join(", ")
                ),
            });
        }

        // --- upload ---
        if self.upload.mirror_root.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "upload.mirror_root".into(),
                message: "must not be empty".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Config`], starting from defaults.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from [`Config::default`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn state_file(mut self, file: PathBuf) -> Self {
        self.config.state.file = file;
        self
    }

    pub fn sync_default_interval(mut self, seconds: u64) -> Self {
        self.config.sync.default_interval = seconds;
        self
    }

    pub fn sync_ignore_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.sync.ignore_file_name = name.into();
        self
    }

    pub fn sync_temp_dir(mut self, dir: PathBuf) -> Self {
        self.config.sync.temp_dir = dir;
        self
    }

    pub fn sync_default_method(mut self, method: impl Into<String>) -> Self {
        self.config.sync.default_method = method.into();
        self
    }

    pub fn upload_mirror_root(mut self, root: PathBuf) -> Self {
        self.config.upload.mirror_root = root;
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert!(cfg.state.file.ends_with("uplink/sync_state.json"));
        assert_eq!(cfg.sync.default_interval, 60);
        assert_eq!(cfg.sync.ignore_file_name, ".uplinkignore");
        assert!(cfg.sync.temp_dir.ends_with("uplink"));
        assert_eq!(cfg.sync.default_method, "aes-256-gcm");
        assert!(cfg.upload.mirror_root.ends_with("uplink/remote"));
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn default_config_passes_validation() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected validation errors: {errors:?}");
    }

    #[test]
    fn default_path_is_under_uplink_dir() {
        assert!(Config::default_path().ends_with("uplink/config.yaml"));
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
state:
  file: /tmp/uplink-test/state.json
sync:
  default_interval: 300
  ignore_file_name: .backupignore
  temp_dir: /tmp/uplink-scratch
  default_method: aes-128-gcm
upload:
  mirror_root: /srv/mirror
logging:
  level: debug
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.state.file, PathBuf::from("/tmp/uplink-test/state.json"));
        assert_eq!(cfg.sync.default_interval, 300);
        assert_eq!(cfg.sync.ignore_file_name, ".backupignore");
        assert_eq!(cfg.sync.temp_dir, PathBuf::from("/tmp/uplink-scratch"));
        assert_eq!(cfg.sync.default_method, "aes-128-gcm");
        assert_eq!(cfg.upload.mirror_root, PathBuf::from("/srv/mirror"));
        assert_eq!(cfg.logging.level, "debug");
    }

    #[test]
    fn load_partial_yaml_fills_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"sync:\n  default_interval: 5\n").unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.sync.default_interval, 5);
        assert_eq!(cfg.sync.ignore_file_name, ".uplinkignore");
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg.sync.default_interval, 60);
    }

    #[test]
    fn load_returns_error_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"not: [valid: yaml: {{{").unwrap();
        tmp.flush().unwrap();

        assert!(Config::load(tmp.path()).is_err());
    }

    // -- Validation --

    #[test]
    fn validate_catches_zero_interval() {
        let mut cfg = Config::default();
        cfg.sync.default_interval = 0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "sync.default_interval"));
    }

    #[test]
    fn validate_catches_ignore_file_with_separator() {
        let mut cfg = Config::default();
        cfg.sync.ignore_file_name = "nested/.ignore".to_string();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "sync.ignore_file_name"));
    }

    #[test]
    fn validate_catches_unknown_method() {
        let mut cfg = Config::default();
        cfg.sync.default_method = "rot13".to_string();
        let errors = cfg.validate();
        assert!(errors
            .iter()
            .any(|e| e.field == "sync.default_method" && e.message.contains("rot13")));
    }

    #[test]
    fn validate_catches_invalid_log_level() {
        let mut cfg = Config::default();
        cfg.logging.level = "verbose".to_string();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "logging.level"));
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError {
            field: "sync.default_interval".into(),
            message: "must be greater than 0".into(),
        };
        assert_eq!(err.to_string(), "sync.default_interval: must be greater than 0");
    }

    // -- Builder --

    #[test]
    fn builder_overrides_defaults() {
        let cfg = ConfigBuilder::new()
            .state_file(PathBuf::from("/tmp/s.json"))
            .sync_default_interval(10)
            .sync_ignore_file_name(".ignore")
            .sync_temp_dir(PathBuf::from("/tmp/scratch"))
            .sync_default_method("aes-128-gcm")
            .upload_mirror_root(PathBuf::from("/tmp/mirror"))
            .logging_level("warn")
            .build();

        assert_eq!(cfg.state.file, PathBuf::from("/tmp/s.json"));
        assert_eq!(cfg.sync.default_interval, 10);
        assert_eq!(cfg.sync.ignore_file_name, ".ignore");
        assert_eq!(cfg.sync.temp_dir, PathBuf::from("/tmp/scratch"));
        assert_eq!(cfg.sync.default_method, "aes-128-gcm");
        assert_eq!(cfg.upload.mirror_root, PathBuf::from("/tmp/mirror"));
        assert_eq!(cfg.logging.level, "warn");
    }

    #[test]
    fn build_validated_reports_errors() {
        let result = ConfigBuilder::new().sync_default_interval(0).build_validated();
        let errors = result.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "sync.default_interval");
    }

    #[test]
    fn config_roundtrips_through_yaml() {
        let cfg = ConfigBuilder::new().sync_default_interval(42).build();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.sync.default_interval, 42);
    }
}
