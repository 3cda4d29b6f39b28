//! Background sweep of expired teleport requests.
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::controller::RequestLifecycleController;
use crate::error::Result;
use crate::host::{MessageSink, PlayerDirectory, Teleporter};
use crate::manager::RequestStorage;

/// Configuration for the sweep daemon.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// How long to sleep between sweeps
    pub sweep_interval_ms: u64,

    /// How long a request stays live without a response
    pub request_ttl_ms: u64,
}

impl DaemonConfig {
    /// Request lifetime; values past chrono's range saturate at the maximum.
    pub fn request_ttl(&self) -> chrono::Duration {
        i64::try_from(self.request_ttl_ms)
            .ok()
            .and_then(chrono::Duration::try_milliseconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 5000, // Sweep every 5 seconds
            request_ttl_ms: 60000,   // 1 minute
        }
    }
}

/// Daemon that periodically expires stale teleport requests.
///
/// The daemon is not woken early by new or resolved requests; a request is cleaned
/// up at most one interval after it times out.
pub struct SweepDaemon<S, H>
where
    S: RequestStorage,
    H: PlayerDirectory + MessageSink + Teleporter,
{
    controller: Arc<RequestLifecycleController<S, H>>,
    config: DaemonConfig,
    shutdown_token: CancellationToken,
}

impl<S, H> SweepDaemon<S, H>
where
    S: RequestStorage + 'static,
    H: PlayerDirectory + MessageSink + Teleporter + 'static,
{
    /// Create a new daemon.
    pub fn new(
        controller: Arc<RequestLifecycleController<S, H>>,
        config: DaemonConfig,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            controller,
            config,
            shutdown_token,
        }
    }

    /// Run the sweep loop until the shutdown token is cancelled.
    ///
    /// Cancellation is only observed between cycles, so a sweep that has started
    /// always finishes notifying everyone it removed.
    #[tracing::instrument(skip(self), fields(interval_ms = self.config.sweep_interval_ms))]
    pub async fn run(self: Arc<Self>) -> Result<()> {
        tracing::info!("Teleport request sweep started");

        let mut interval = tokio::time::interval(Duration::from_millis(
            self.config.sweep_interval_ms.max(1),
        ));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!("Shutting down teleport request sweep");
                    break;
                }
                _ = interval.tick() => {
                    let expired = self.controller.run_sweep_cycle();
                    tracing::trace!(expired = expired.len(), "Sweep cycle complete");
                }
            }
        }

        Ok(())
    }

    /// Spawn the sweep loop on the current runtime.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }
}
