//! Parallel chunk processor and pass orchestration.
//!
//! Each worker owns one contiguous chunk of the filtered catalog and walks
//! it strictly in order, issuing one instant query per identifier through
//! the retrying client. Per-item failures are logged and skipped; partial
//! collection is the expected steady state under a flaky backend. Chunk
//! outputs flow through a single channel into the aggregation step.

use std::time::Instant;

use error_stack::ResultExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::error;
use tracing::info;

use crate::aggregate::aggregate;
use crate::catalog;
use crate::client::QueryClient;
use crate::client::RetryPolicy;
use crate::config::CollectorConfig;
use crate::config::QueryKind;
use crate::error::CollectError;
use crate::error::CollectResult;
use crate::partition::partition;
use crate::types::ChunkOutcome;
use crate::types::CollectionSnapshot;
use crate::types::RateSample;

/// Instant query response body. Only the first result row's value is used.
#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    data: QueryData,
}

#[derive(Debug, Default, Deserialize)]
struct QueryData {
    #[serde(default)]
    result: Vec<QueryRow>,
}

#[derive(Debug, Deserialize)]
struct QueryRow {
    /// `[unix_seconds, "value"]` pair; absent for empty vectors
    #[serde(default)]
    value: Option<(f64, String)>,
}

/// Extract the rate from a query response, if it carries a usable value.
fn extract_rate(response: QueryResponse) -> Option<f64> {
    let row = response.data.result.into_iter().next()?;
    let (_, value) = row.value?;
    value.parse().ok()
}

/// Issue one instant query and read its rate, if any. A malformed body is
/// a [`CollectError::Parse`] failure; an empty result vector is `Ok(None)`.
async fn query_metric(
    client: &QueryClient,
    query_url: &str,
    query: &str,
    policy: &RetryPolicy,
) -> CollectResult<Option<f64>> {
    let response = client
        .get_with_retry(query_url, &[("query", query)], policy)
        .await?;

    let body: QueryResponse = response.json().await.change_context(CollectError::Parse {
        message: "Malformed query response body".into(),
    })?;

    Ok(extract_rate(body))
}

/// Process one chunk sequentially, recording a timing sample for every
/// attempt and a rate sample only on success with a parseable value.
pub async fn process_chunk(
    client: &QueryClient,
    query_url: &str,
    chunk: &[String],
    query_kind: QueryKind,
    policy: &RetryPolicy,
) -> ChunkOutcome {
    let mut outcome = ChunkOutcome::default();

    for metric in chunk {
        let started = Instant::now();
        if !policy.quiet {
            debug!(metric = %metric, "Processing metric");
        }

        let query = query_kind.render(metric);
        match query_metric(client, query_url, &query, policy).await {
            Ok(Some(rate)) => outcome.samples.push(RateSample::new(metric.clone(), rate)),
            Ok(None) => {}
            Err(report) => {
                if !policy.quiet {
                    error!(metric = %metric, "Error processing metric: {report}");
                }
            }
        }

        outcome.timings.push(started.elapsed());
    }

    outcome
}

/// One full collection pass: catalog → partition → parallel queries →
/// aggregation.
#[derive(Debug, Clone)]
pub struct Collector {
    config: CollectorConfig,
    client: QueryClient,
}

impl Collector {
    pub fn new(config: CollectorConfig) -> CollectResult<Self> {
        let client = QueryClient::new(&config)?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Run one pass. Catalog failures abort the pass; per-item failures
    /// only shrink the result set. `quiet` silences per-attempt and
    /// per-item logging without changing behavior.
    ///
    /// # Errors
    ///
    /// - [`CollectError::Catalog`] when the identifier list or the
    ///   aggregation rules cannot be obtained after retries
    ///
    /// [`CollectError::Catalog`]: crate::error::CollectError::Catalog
    pub async fn run_pass(&self, quiet: bool) -> CollectResult<CollectionSnapshot> {
        let started = Instant::now();
        let policy =
            RetryPolicy::new(self.config.max_retries, self.config.retry_delay).with_quiet(quiet);

        let names = catalog::fetch_metric_names(&self.client, &self.config, &policy).await?;
        let rules = catalog::fetch_aggregation_rules(&self.client, &self.config, &policy).await?;
        let excluded = catalog::exclusion_set(&rules);
        if !quiet {
            info!(count = excluded.len(), "Found metrics with aggregation rules");
        }

        let filtered = catalog::filter_catalog(&names, &excluded, &self.config);
        let items_processed = filtered.len();
        let chunks = partition(&filtered, self.config.worker_count);
        if !quiet {
            info!(
                metrics = items_processed,
                chunks = chunks.len(),
                workers = self.config.worker_count,
                "Processing filtered metrics"
            );
        }

        // Single aggregation point: every worker reports exactly once.
        let (tx, mut rx) = mpsc::channel(chunks.len().max(1));
        let mut handles = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.into_iter().enumerate() {
            let client = self.client.clone();
            let query_url = self.config.query_url();
            let query_kind = self.config.query_kind;
            let policy = policy.clone();
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                let outcome =
                    process_chunk(&client, &query_url, &chunk, query_kind, &policy).await;
                let _ = tx.send((index, outcome)).await;
            }));
        }
        drop(tx);

        let mut indexed = Vec::with_capacity(handles.len());
        while let Some(entry) = rx.recv().await {
            indexed.push(entry);
        }
        // A panicked worker loses its chunk but never the pass.
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Chunk worker failed: {e}");
            }
        }

        // Restore catalog order across chunks before merging, so that
        // rate ties break deterministically.
        indexed.sort_by_key(|(index, _)| *index);
        let outcomes: Vec<ChunkOutcome> =
            indexed.into_iter().map(|(_, outcome)| outcome).collect();

        let snapshot = aggregate(outcomes, started.elapsed(), items_processed, self.config.min_rate);

        if !quiet {
            info!(
                total_runtime_sec = format!("{:.2}", snapshot.total_time.as_secs_f64()),
                avg_metric_sec = format!("{:.3}", snapshot.avg_item_time.as_secs_f64()),
                metrics_processed = snapshot.items_processed,
                metrics_per_sec = format!("{:.1}", snapshot.throughput),
                above_threshold = snapshot.above_threshold(),
                "Collection pass completed"
            );
        }

        Ok(snapshot)
    }
}
