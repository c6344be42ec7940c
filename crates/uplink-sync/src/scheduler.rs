//! Per-watch periodic task
//!
//! Each running watch owns one [`WatchTask`]. The task runs a pass
//! immediately, then one pass per interval until its cancellation token
//! fires. A pass that overruns the interval delays the next tick instead
//! of queueing a burst of catch-up passes.
//!
//! ```text
//! start ──→ pass ──→ wait(interval) ──→ pass ──→ ... ──→ cancelled
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uplink_core::domain::WatchId;

use crate::engine::SyncEngine;
use crate::SyncError;

/// Shortest period the timer accepts
const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Periodic pass loop for one watch
pub struct WatchTask {
    id: WatchId,
    engine: Arc<SyncEngine>,
    period: Duration,
    cancel: CancellationToken,
}

impl WatchTask {
    pub fn new(
        id: WatchId,
        engine: Arc<SyncEngine>,
        period: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            engine,
            period,
            cancel,
        }
    }

    /// Spawn the loop on the current runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run passes until cancelled or until the watch disappears
    #[tracing::instrument(skip(self), fields(watch = %self.id.short(), period_secs = self.period.as_secs()))]
    pub async fn run(self) {
        info!("Watch task started");

        let mut ticker = tokio::time::interval(self.period.max(MIN_PERIOD));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                _ = ticker.tick() => {
                    match self.engine.run_pass(&self.id, &self.cancel).await {
                        Ok(report) if report.failed > 0 => {
                            warn!(failed = report.failed, "Pass finished with failures");
                        }
                        Ok(_) => {}
                        Err(SyncError::UnknownWatch(_)) => {
                            info!("Watch removed, stopping task");
                            break;
                        }
                        Err(err) => {
                            error!(error = %err, "Pass failed");
                        }
                    }

                    if self.cancel.is_cancelled() {
                        break;
                    }
                    let next = chrono::Utc::now()
                        + chrono::Duration::from_std(self.period).unwrap_or(chrono::Duration::zero());
                    info!(next_pass = %next.to_rfc3339(), "Next pass scheduled");
                }
            }
        }

        info!("Watch task stopped");
    }
}
