use std::fmt::Write as _;

use dpm_core::types::sanitize_metric_name;
use dpm_core::CollectionSnapshot;

use super::ReportEncoder;

/// Prometheus text exposition encoder for one-shot report files.
pub struct PromEncoder;

impl ReportEncoder for PromEncoder {
    fn encode(&self, snapshot: &CollectionSnapshot) -> String {
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

        out.push_str("\n# HELP dpm_finder_runtime_seconds Total runtime of the DPM finder\n");
        out.push_str("# TYPE dpm_finder_runtime_seconds gauge\n");
        let _ = writeln!(
            out,
            "dpm_finder_runtime_seconds {}",
            snapshot.total_time.as_secs_f64()
        );

        out.push_str(
            "\n# HELP dpm_finder_avg_metric_process_seconds Average time to process each metric\n",
        );
        out.push_str("# TYPE dpm_finder_avg_metric_process_seconds gauge\n");
        let _ = writeln!(
            out,
            "dpm_finder_avg_metric_process_seconds {}",
            snapshot.avg_item_time.as_secs_f64()
        );

        out.push_str(
            "\n# HELP dpm_finder_metrics_processed_total Total number of metrics processed\n",
        );
        out.push_str("# TYPE dpm_finder_metrics_processed_total counter\n");
        let _ = writeln!(
            out,
            "dpm_finder_metrics_processed_total {}",
            snapshot.items_processed
        );

        out.push_str(
            "\n# HELP dpm_finder_processing_rate_metrics_per_second Rate of metric processing\n",
        );
        out.push_str("# TYPE dpm_finder_processing_rate_metrics_per_second gauge\n");
        let _ = writeln!(
            out,
            "dpm_finder_processing_rate_metrics_per_second {}",
            snapshot.throughput
        );

        out
    }

    fn default_path(&self) -> &'static str {
        "metric_rates.prom"
    }
}
