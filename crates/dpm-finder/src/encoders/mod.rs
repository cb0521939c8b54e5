//! Report encoders for one-shot mode.
//!
//! Each encoder turns a finished [`CollectionSnapshot`] into one output
//! document; none of them influence collection behavior.

mod csv;
mod json;
mod prom;
mod text;

use dpm_core::CollectionSnapshot;

pub use self::csv::CsvEncoder;
pub use self::json::JsonEncoder;
pub use self::prom::PromEncoder;
pub use self::text::TextEncoder;

use crate::config::OutputFormat;

/// Renders a snapshot into one report document.
pub trait ReportEncoder {
    fn encode(&self, snapshot: &CollectionSnapshot) -> String;

    /// Default output file for this format.
    fn default_path(&self) -> &'static str;
}

/// Select the encoder for a CLI format choice.
pub fn for_format(format: OutputFormat) -> Box<dyn ReportEncoder> {
    match format {
        OutputFormat::Csv => Box::new(CsvEncoder),
        OutputFormat::Text => Box::new(TextEncoder),
        OutputFormat::Json => Box::new(JsonEncoder),
        OutputFormat::Prom => Box::new(PromEncoder),
    }
}
