//! Exporter runtime.
//!
//! Owns the process-wide [`ExporterState`] and refreshes it on a timer.
//! The published snapshot is replaced by a single pointer swap, so readers
//! never observe a partially-updated snapshot, and a failed refresh leaves
//! the last-known-good snapshot in place.

use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::client::retry_with_backoff;
use crate::client::RetryPolicy;
use crate::collect::Collector;
use crate::types::CollectionSnapshot;

/// Process-wide state for exporter mode: the current snapshot, atomically
/// replaced at the end of every successful pass. Single writer (the
/// refresh task), many readers (the exposition endpoint).
#[derive(Debug, Default)]
pub struct ExporterState {
    snapshot: RwLock<Arc<CollectionSnapshot>>,
}

impl ExporterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current snapshot. One Arc swap, never an in-place
    /// mutation.
    pub fn publish(&self, snapshot: CollectionSnapshot) {
        let mut guard = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(snapshot);
    }

    /// The current snapshot. Empty and zeroed until the first successful
    /// pass publishes.
    pub fn current(&self) -> Arc<CollectionSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Periodic refresh task driving the exporter's snapshot.
pub struct ExporterRuntime {
    collector: Collector,
    state: Arc<ExporterState>,
    refresh_interval: Duration,
    initial_policy: RetryPolicy,
    background_policy: RetryPolicy,
}

impl ExporterRuntime {
    pub fn new(collector: Collector, state: Arc<ExporterState>, refresh_interval: Duration) -> Self {
        Self {
            collector,
            state,
            refresh_interval,
            initial_policy: RetryPolicy::initial_pass(),
            background_policy: RetryPolicy::background_pass(),
        }
    }

    /// Override the pass-level retry schedules.
    pub fn with_retry_policies(mut self, initial: RetryPolicy, background: RetryPolicy) -> Self {
        self.initial_policy = initial;
        self.background_policy = background;
        self
    }

    /// Run the initial pass and then the refresh loop until cancelled.
    ///
    /// The initial pass gets an elevated retry budget because the first
    /// snapshot is user-visible immediately. Background passes run quiet
    /// with a reduced budget; a total failure keeps the previous snapshot
    /// and waits for the next interval. After cancellation no further
    /// request attempts are made.
    pub async fn run(&self, token: CancellationToken) {
        info!("Performing initial metrics collection");
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!("Metrics updater cancelled before initial collection");
                return;
            }
            result = retry_with_backoff(&self.initial_policy, "Initial metrics collection", || {
                self.collector.run_pass(false)
            }) => {
                match result {
                    Ok(snapshot) => {
                        self.state.publish(snapshot);
                        info!("Initial metrics collection completed");
                    }
                    Err(report) => {
                        warn!(
                            "Initial metrics collection failed, continuing with empty metrics \
                             until next update cycle: {report:?}"
                        );
                    }
                }
            }
        }

        info!(
            interval_sec = self.refresh_interval.as_secs(),
            "Starting metrics updater"
        );
        loop {
            // Single cancellable wait: interval elapse or shutdown,
            // whichever comes first.
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.refresh_interval) => {}
            }
            if token.is_cancelled() {
                break;
            }

            let result = retry_with_backoff(
                &self.background_policy,
                "Periodic metrics collection",
                || self.collector.run_pass(true),
            )
            .await;
            match result {
                Ok(snapshot) => {
                    self.state.publish(snapshot);
                    debug!("Metrics updated successfully");
                }
                Err(report) => {
                    warn!("Periodic metrics collection failed, keeping previous snapshot: {report:?}");
                }
            }
        }

        info!("Metrics updater stopped");
    }
}
