//! Run command - One pass of one watch
//!
//! `uplink run LOCAL` uploads whatever changed since the last pass and
//! prints the pass report. It fails if the watch is already running in
//! this process.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use uplink_core::config::Config;

use crate::commands::build_registry;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct RunCommand {
    /// Local directory of the watch
    pub local: PathBuf,
}

impl RunCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let registry = build_registry(config);
        let report = registry.run_once(&self.local).await?;

        formatter.report(&self.local, &report);
        Ok(())
    }
}
