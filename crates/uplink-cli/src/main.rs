//! uplink CLI - Command-line interface for uplink
//!
//! Provides commands for:
//! - Adding, deleting and listing watches
//! - Running watches until interrupted
//! - Running a single pass of one watch
//! - Inspecting the configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uplink_core::config::Config;

mod commands;
mod output;

use commands::{config::ConfigCommand, run::RunCommand, start::StartCommand, watch::WatchCommand};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "uplink", version, about = "Periodic directory upload with encryption")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Add, delete and list watches
    #[command(subcommand)]
    Watch(WatchCommand),
    /// Start watches and keep uploading until interrupted
    Start(StartCommand),
    /// Run a single pass of one watch
    Run(RunCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path);

    // RUST_LOG wins, then -v/-q, then the configured level
    let filter = match (cli.quiet, cli.verbose) {
        (true, 0) => "warn",
        (_, 0) => config.logging.level.as_str(),
        (_, 1) => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(config_path = %config_path.display(), "Loaded configuration");

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human { quiet: cli.quiet }
    };

    match cli.command {
        Commands::Watch(cmd) => cmd.execute(&config, format).await,
        Commands::Start(cmd) => cmd.execute(&config, format).await,
        Commands::Run(cmd) => cmd.execute(&config, format).await,
        Commands::Config(cmd) => cmd.execute(&config, &config_path, format).await,
    }
}
