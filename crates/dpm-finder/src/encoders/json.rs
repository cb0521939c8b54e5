use dpm_core::CollectionSnapshot;
use serde_json::json;

use super::ReportEncoder;

/// JSON encoder: results plus a performance-statistics section.
pub struct JsonEncoder;

fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

impl ReportEncoder for JsonEncoder {
    fn encode(&self, snapshot: &CollectionSnapshot) -> String {
        let metrics: Vec<_> = snapshot
            .rates
            .iter()
            .map(|sample| json!({ "metric_name": sample.name, "dpm": sample.rate }))
            .collect();

        let document = json!({
            "metrics": metrics,
            "total_metrics_above_threshold": snapshot.above_threshold(),
            "performance_metrics": {
                "total_runtime_seconds": round_to(snapshot.total_time.as_secs_f64(), 2),
                "average_metric_processing_seconds": round_to(snapshot.avg_item_time.as_secs_f64(), 3),
                "total_metrics_processed": snapshot.items_processed,
                "metrics_per_second": round_to(snapshot.throughput, 1),
            },
        });

        serde_json::to_string_pretty(&document).expect("snapshot document is always serializable")
    }

    fn default_path(&self) -> &'static str {
        "metric_rates.json"
    }
}
