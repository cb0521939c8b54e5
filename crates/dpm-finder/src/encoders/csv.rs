use std::fmt::Write as _;

use dpm_core::CollectionSnapshot;

use super::ReportEncoder;

/// CSV encoder: one `metric_name,dpm` row per result.
pub struct CsvEncoder;

impl ReportEncoder for CsvEncoder {
    fn encode(&self, snapshot: &CollectionSnapshot) -> String {
        let mut out = String::from("metric_name,dpm\n");
        for sample in &snapshot.rates {
            let _ = writeln!(out, "{},{}", sample.name, sample.rate);
        }
        out
    }

    fn default_path(&self) -> &'static str {
        "metric_rates.csv"
    }
}
