//! Start command - Run watches in the foreground
//!
//! Provides the `uplink start` CLI command which:
//! 1. Starts one watch (when LOCAL is given) or every configured watch
//! 2. Blocks until SIGINT or SIGTERM
//! 3. Stops every watch and waits for in-flight passes to wind down

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;
use uplink_core::config::Config;

use crate::commands::build_registry;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct StartCommand {
    /// Start only the watch for this directory
    pub local: Option<PathBuf>,
}

impl StartCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let registry = build_registry(config);

        let started = match &self.local {
            Some(local) => {
                registry.start_watch(local).await?;
                1
            }
            None => registry.start_all().await?,
        };

        if started == 0 {
            formatter.warn("No watches to start. Use 'uplink watch add LOCAL REMOTE'.");
            return Ok(());
        }

        if format.is_json() {
            formatter.print_json(&serde_json::json!({ "started": started }));
        } else {
            formatter.success(&format!("Started {started} watch(es). Press Ctrl+C to stop."));
        }

        shutdown_signal().await;

        info!("Stopping watches");
        registry.shutdown().await;
        formatter.success("All watches stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
}
