use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use dpm_core::exposition::BoundExposition;
use dpm_core::ExporterRuntime;
use dpm_core::ExporterState;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Task manager for exporter mode: the exposition server and the
/// periodic refresh task, tied together by one cancellation token.
pub struct Tasks {
    pub tasks: Vec<JoinHandle<()>>,
    cancellation_token: CancellationToken,
}

impl Default for Tasks {
    fn default() -> Self {
        Self::new()
    }
}

impl Tasks {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Serve the already-bound exposition endpoint.
    pub fn spawn_exposition_task(&mut self, bound: BoundExposition, state: Arc<ExporterState>) {
        let token = self.cancellation_token.clone();
        let task = tokio::spawn(async move {
            tracing::info!("Starting exposition server task");
            if let Err(e) = bound.serve(state, token).await {
                tracing::error!("Exposition server failed: {e:?}");
            } else {
                tracing::info!("Exposition server task completed");
            }
        });
        self.tasks.push(task);
    }

    /// Run the initial collection pass and the periodic refresh loop.
    pub fn spawn_refresh_task(&mut self, runtime: ExporterRuntime) {
        let token = self.cancellation_token.clone();
        let task = tokio::spawn(async move {
            tracing::info!("Starting metrics refresh task");
            runtime.run(token).await;
            tracing::info!("Metrics refresh task completed");
        });
        self.tasks.push(task);
    }

    /// wait for tasks to complete or receive shutdown signal
    pub async fn wait_for_completion(&mut self) -> Result<()> {
        // Set up signal handling for graceful shutdown
        let signal_handler = {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate())?;
                let mut sigint = signal(SignalKind::interrupt())?;

                tokio::spawn(async move {
                    tokio::select! {
                        _ = sigterm.recv() => {
                            tracing::info!("Received SIGTERM, initiating graceful shutdown");
                        }
                        _ = sigint.recv() => {
                            tracing::info!("Received SIGINT, initiating graceful shutdown");
                        }
                    }
                })
            }
            #[cfg(not(unix))]
            {
                tokio::spawn(async {
                    tokio::signal::ctrl_c()
                        .await
                        .expect("Failed to install Ctrl+C handler");
                    tracing::info!("Received Ctrl+C, initiating graceful shutdown");
                })
            }
        };

        tokio::select! {
            // Wait for shutdown signal
            _ = signal_handler => {
                tracing::info!("Shutdown signal received, cancelling all tasks");
                self.cancellation_token.cancel();

                // Wait for all tasks with a bounded grace period
                self.wait_for_tasks_with_timeout(Duration::from_secs(5)).await;
            }
            // Wait for any task to complete unexpectedly
            result = futures::future::select_all(&mut self.tasks) => {
                let (result, _index, _remaining) = result;
                self.cancellation_token.cancel();
                if let Err(e) = result {
                    tracing::error!("Task completed with error: {e}");
                    return Err(e.into());
                }
                tracing::warn!("Task completed unexpectedly");
            }
        }

        Ok(())
    }

    async fn wait_for_tasks_with_timeout(&mut self, timeout: Duration) {
        tokio::time::timeout(timeout, async {
            for task in &mut self.tasks {
                if let Err(e) = task.await {
                    tracing::error!("Task failed during shutdown: {e}");
                }
            }
        })
        .await
        .unwrap_or_else(|_| {
            tracing::warn!("Task shutdown timed out after {:?}", timeout);
        });
    }
}
