use std::fmt::Write as _;

use dpm_core::CollectionSnapshot;

use super::ReportEncoder;

/// Plain text encoder for human-readable report files.
pub struct TextEncoder;

impl ReportEncoder for TextEncoder {
    fn encode(&self, snapshot: &CollectionSnapshot) -> String {
        let mut out = String::from("Metrics and their DPM values:\n");
        for sample in &snapshot.rates {
            let _ = writeln!(out, "{}: {}", sample.name, sample.rate);
        }

        out.push_str("\nPerformance Metrics:\n");
        let _ = writeln!(
            out,
            "Total runtime: {:.2} seconds",
            snapshot.total_time.as_secs_f64()
        );
        let _ = writeln!(
            out,
            "Average time per metric: {:.3} seconds",
            snapshot.avg_item_time.as_secs_f64()
        );
        let _ = writeln!(out, "Total metrics processed: {}", snapshot.items_processed);
        let _ = writeln!(
            out,
            "Metrics processing rate: {:.1} metrics/second",
            snapshot.throughput
        );

        out
    }

    fn default_path(&self) -> &'static str {
        "metric_rates.txt"
    }
}
