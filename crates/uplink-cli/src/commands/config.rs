//! Config command - View and validate uplink configuration
//!
//! Provides the `uplink config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Validates the configuration and reports every problem found

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;
use uplink_core::config::Config;

use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, config: &Config, path: &Path, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(config, path, format),
            ConfigCommand::Validate => execute_validate(config, path, format),
        }
    }
}

fn execute_show(config: &Config, path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    info!(config_path = %path.display(), "Showing configuration");

    if format.is_json() {
        let json =
            serde_json::to_value(config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
        return Ok(());
    }

    let source = if path.exists() { "" } else { ", defaults" };
    formatter.success(&format!("Configuration ({}{})", path.display(), source));

    // The document is the result, so it is printed even with --quiet
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration to YAML")?;
    println!();
    for line in yaml.lines() {
        println!("  {line}");
    }
    Ok(())
}

fn execute_validate(config: &Config, path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    // A file that fails to parse is reported as-is rather than as defaults
    if path.exists() {
        Config::load(path)?;
    }

    let errors = config.validate();
    if format.is_json() {
        let items: Vec<serde_json::Value> = errors
            .iter()
            .map(|e| serde_json::json!({ "field": e.field, "message": e.message }))
            .collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "errors": items,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
    } else {
        for error in &errors {
            formatter.error(&format!("{}: {}", error.field, error.message));
        }
    }

    if !errors.is_empty() {
        anyhow::bail!("{} configuration error(s)", errors.len());
    }
    Ok(())
}
