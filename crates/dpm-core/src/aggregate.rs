//! Result aggregator.
//!
//! Pure computation over in-memory chunk outputs: merge, statistics,
//! threshold filter, deterministic ordering. No I/O happens here.

use std::cmp::Ordering;
use std::time::Duration;

use chrono::Utc;

use crate::types::ChunkOutcome;
use crate::types::CollectionSnapshot;
use crate::types::RateSample;

/// Merge chunk outcomes (already in catalog order) into one snapshot.
///
/// Keys cannot collide because chunks partition the catalog. Results are
/// sorted by rate descending with a stable sort, so ties keep the original
/// catalog order, and filtered to rates strictly greater than `min_rate`.
pub fn aggregate(
    outcomes: Vec<ChunkOutcome>,
    total_time: Duration,
    items_processed: usize,
    min_rate: f64,
) -> CollectionSnapshot {
    let mut merged: Vec<RateSample> = Vec::new();
    let mut timings: Vec<Duration> = Vec::new();
    for outcome in outcomes {
        merged.extend(outcome.samples);
        timings.extend(outcome.timings);
    }

    merged.sort_by(|a, b| b.rate.partial_cmp(&a.rate).unwrap_or(Ordering::Equal));
    merged.retain(|sample| sample.rate > min_rate);

    let avg_item_time = if timings.is_empty() {
        Duration::ZERO
    } else {
        timings.iter().sum::<Duration>() / timings.len() as u32
    };

    let throughput = if total_time.is_zero() {
        0.0
    } else {
        items_processed as f64 / total_time.as_secs_f64()
    };

    CollectionSnapshot {
        rates: merged,
        total_time,
        avg_item_time,
        items_processed,
        throughput,
        last_update: Some(Utc::now()),
    }
}
