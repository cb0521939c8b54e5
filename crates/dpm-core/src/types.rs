//! Core data model for collection passes.

use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

/// One identifier paired with the rate its query returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateSample {
    pub name: String,
    pub rate: f64,
}

impl RateSample {
    pub fn new(name: impl Into<String>, rate: f64) -> Self {
        Self {
            name: name.into(),
            rate,
        }
    }
}

/// Output of one chunk worker: samples for the identifiers that produced a
/// usable value, and a timing entry for every attempt regardless of
/// success. Samples stay in chunk (catalog) order.
#[derive(Debug, Default)]
pub struct ChunkOutcome {
    pub samples: Vec<RateSample>,
    pub timings: Vec<Duration>,
}

/// Aggregated, immutable-once-built result of one full collection pass.
///
/// `rates` holds only entries strictly above the configured threshold,
/// sorted by rate descending with ties in catalog order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionSnapshot {
    pub rates: Vec<RateSample>,
    /// wall-clock span from collection start to last chunk completion
    pub total_time: Duration,
    /// mean duration of all per-identifier queries, zero when none ran
    pub avg_item_time: Duration,
    /// size of the filtered catalog this pass worked through
    pub items_processed: usize,
    /// items per second over the whole pass, zero for a zero-length pass
    pub throughput: f64,
    /// completion time of the pass; `None` until one pass has succeeded
    pub last_update: Option<DateTime<Utc>>,
}

impl CollectionSnapshot {
    /// Number of identifiers above the threshold.
    pub fn above_threshold(&self) -> usize {
        self.rates.len()
    }
}

/// Replace characters that are not valid in a Prometheus label value used
/// as a metric identifier: `-`, `.` and `:` become `_`.
pub fn sanitize_metric_name(name: &str) -> String {
    name.replace(['-', '.', ':'], "_")
}
