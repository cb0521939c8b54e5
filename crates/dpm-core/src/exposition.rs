//! Pull-based exposition endpoint.
//!
//! Serves the current [`ExporterState`] snapshot as Prometheus text
//! exposition at `GET /metrics`. The endpoint is bound before any
//! collection starts, and stays responsive with a zeroed snapshot until
//! the first pass succeeds.

use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use error_stack::Report;
use error_stack::ResultExt;
use poem::get;
use poem::handler;
use poem::listener::Acceptor;
use poem::listener::Listener;
use poem::listener::TcpAcceptor;
use poem::listener::TcpListener;
use poem::web::Data;
use poem::Endpoint;
use poem::EndpointExt;
use poem::Route;
use poem::Server;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::CollectError;
use crate::error::CollectResult;
use crate::exporter::ExporterState;
use crate::types::sanitize_metric_name;
use crate::types::CollectionSnapshot;

/// Render a snapshot in Prometheus text exposition format.
pub fn render_exposition(snapshot: &CollectionSnapshot) -> String {
    let mut out = String::new();

    out.push_str("# HELP metric_dpm_rate Data points per minute for each metric\n");
    out.push_str("# TYPE metric_dpm_rate gauge\n");
    for sample in &snapshot.rates {
        let _ = writeln!(
            out,
            "metric_dpm_rate{{metric_name=\"{}\"}} {}",
            sanitize_metric_name(&sample.name),
            sample.rate
        );
    }

    out.push_str("# HELP dpm_finder_runtime_seconds Total runtime of the last DPM calculation\n");
    out.push_str("# TYPE dpm_finder_runtime_seconds gauge\n");
    let _ = writeln!(
        out,
        "dpm_finder_runtime_seconds {}",
        snapshot.total_time.as_secs_f64()
    );

    out.push_str(
        "# HELP dpm_finder_avg_metric_process_seconds Average time to process each metric\n",
    );
    out.push_str("# TYPE dpm_finder_avg_metric_process_seconds gauge\n");
    let _ = writeln!(
        out,
        "dpm_finder_avg_metric_process_seconds {}",
        snapshot.avg_item_time.as_secs_f64()
    );

    out.push_str("# HELP dpm_finder_metrics_processed_total Total number of metrics processed\n");
    out.push_str("# TYPE dpm_finder_metrics_processed_total counter\n");
    let _ = writeln!(
        out,
        "dpm_finder_metrics_processed_total {}",
        snapshot.items_processed
    );

    out.push_str(
        "# HELP dpm_finder_processing_rate_metrics_per_second Rate of metric processing\n",
    );
    out.push_str("# TYPE dpm_finder_processing_rate_metrics_per_second gauge\n");
    let _ = writeln!(
        out,
        "dpm_finder_processing_rate_metrics_per_second {}",
        snapshot.throughput
    );

    out.push_str("# HELP dpm_finder_last_update_timestamp Unix timestamp of last metrics update\n");
    out.push_str("# TYPE dpm_finder_last_update_timestamp gauge\n");
    let last_update = snapshot
        .last_update
        .map(|ts| ts.timestamp())
        .unwrap_or_default();
    let _ = writeln!(out, "dpm_finder_last_update_timestamp {last_update}");

    out
}

#[handler]
fn metrics_handler(Data(state): Data<&Arc<ExporterState>>) -> String {
    render_exposition(&state.current())
}

/// Poem routes for the exposition surface.
pub fn routes(state: Arc<ExporterState>) -> impl Endpoint {
    Route::new().at("/metrics", get(metrics_handler)).data(state)
}

/// A bound-but-not-yet-serving exposition endpoint. Binding is split from
/// serving so that a bind failure is fatal before any collection work, and
/// collection only starts once the listener is live.
pub struct BoundExposition {
    acceptor: TcpAcceptor,
    addr: SocketAddr,
}

/// Bind the exposition listener.
///
/// # Errors
///
/// - [`CollectError::Configuration`] if the address cannot be bound
pub async fn bind(listen_addr: &str) -> CollectResult<BoundExposition> {
    let acceptor = TcpListener::bind(listen_addr)
        .into_acceptor()
        .await
        .change_context(CollectError::Configuration {
            message: format!("Failed to bind exporter listener on {listen_addr}"),
        })?;

    let addr = acceptor
        .local_addr()
        .into_iter()
        .next()
        .and_then(|local| local.as_socket_addr().copied())
        .ok_or_else(|| {
            Report::new(CollectError::Configuration {
                message: "Bound listener has no socket address".into(),
            })
        })?;

    Ok(BoundExposition { acceptor, addr })
}

impl BoundExposition {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until the token is cancelled, then shut down with a short
    /// grace period for in-flight requests.
    pub async fn serve(
        self,
        state: Arc<ExporterState>,
        token: CancellationToken,
    ) -> CollectResult<()> {
        info!(addr = %self.addr, "Exporter metrics available at /metrics");

        Server::new_with_acceptor(self.acceptor)
            .run_with_graceful_shutdown(
                routes(state),
                token.cancelled_owned(),
                Some(Duration::from_secs(2)),
            )
            .await
            .change_context(CollectError::Configuration {
                message: "Exposition server failed".into(),
            })
    }
}
