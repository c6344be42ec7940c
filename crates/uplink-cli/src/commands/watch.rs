//! Watch command - Configure watches
//!
//! Provides the `uplink watch` CLI commands:
//! - `add` registers a local directory with its remote destination
//! - `delete` removes a watch and its per-file state
//! - `list` shows every watch with its settings and running flag

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Subcommand;
use tracing::info;
use uplink_core::config::{Config, SUPPORTED_METHODS};
use uplink_core::domain::{EncryptionSettings, FingerprintMode, SyncMode};
use uplink_sync::NewWatch;

use crate::commands::build_registry;
use crate::output::{get_formatter, status_json, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum WatchCommand {
    /// Watch a local directory
    Add {
        /// Local directory to upload
        local: PathBuf,
        /// Remote destination directory (absolute, e.g. /backup/docs)
        remote: String,
        /// Seconds between passes (defaults to sync.default_interval)
        #[arg(long)]
        interval: Option<u64>,
        /// Encrypt every upload with this key
        #[arg(long)]
        key: Option<String>,
        /// Encryption method (defaults to sync.default_method)
        #[arg(long, requires = "key")]
        method: Option<String>,
        /// Ignore-rule file (relative paths resolve against LOCAL)
        #[arg(long)]
        ignore_file: Option<PathBuf>,
        /// Upload under random names (requires --key)
        #[arg(long, requires = "key")]
        anonymize: bool,
        /// Upload the whole directory as one archive per pass
        #[arg(long)]
        bundle: bool,
        /// Detect changes by mtime and size instead of content hash
        #[arg(long)]
        metadata: bool,
    },
    /// Stop watching a local directory
    Delete {
        /// Local directory of the watch
        local: PathBuf,
    },
    /// List configured watches
    List,
}

impl WatchCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        match self {
            WatchCommand::Add {
                local,
                remote,
                interval,
                key,
                method,
                ignore_file,
                anonymize,
                bundle,
                metadata,
            } => {
                let method = method
                    .clone()
                    .unwrap_or_else(|| config.sync.default_method.clone());
                let mut request = NewWatch::new(
                    local,
                    remote.clone(),
                    interval.unwrap_or(config.sync.default_interval),
                );
                request.encryption = key.as_ref().map(|key| EncryptionSettings {
                    key: key.clone(),
                    method,
                });
                request.ignore_file = ignore_file.clone();
                request.anonymize_names = *anonymize;
                if *bundle {
                    request.mode = SyncMode::Bundle;
                }
                if *metadata {
                    request.fingerprint = FingerprintMode::Metadata;
                }
                self.execute_add(config, request, format).await
            }
            WatchCommand::Delete { local } => self.execute_delete(config, local, format).await,
            WatchCommand::List => self.execute_list(config, format).await,
        }
    }

    async fn execute_add(&self, config: &Config, request: NewWatch, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        if let Some(settings) = &request.encryption {
            let method = settings.method.to_ascii_lowercase();
            if !SUPPORTED_METHODS.contains(&method.as_str()) {
                anyhow::bail!(
                    "Unsupported encryption method '{}' (expected one of: {})",
                    settings.method,
                    SUPPORTED_METHODS.join(", ")
                );
            }
        }

        let registry = build_registry(config);
        let entry = registry.add_watch(request).await?;
        info!(local = %entry.local.display(), "Watch added");

        if format.is_json() {
            formatter.print_json(&status_json(&entry.id(), &entry, false));
            return Ok(());
        }

        formatter.success(&format!(
            "Watching {} -> {}",
            entry.local.display(),
            entry.remote
        ));
        formatter.info(&format!("Interval: {}s", entry.interval_secs));
        if entry.encryption.is_some() {
            formatter.info("Encryption: enabled");
        }
        if entry.mode == SyncMode::Bundle {
            formatter.info("Mode: bundle");
        }
        formatter.info("Run 'uplink start' to begin uploading.");
        Ok(())
    }

    async fn execute_delete(&self, config: &Config, local: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let registry = build_registry(config);

        registry.delete_watch(local).await?;
        formatter.success(&format!("Removed watch {}", local.display()));
        Ok(())
    }

    async fn execute_list(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let registry = build_registry(config);
        let watches = registry.list_watches().await?;

        formatter.watches(&watches);
        Ok(())
    }
}
