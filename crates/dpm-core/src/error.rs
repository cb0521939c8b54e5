//! Error types for the collection engine.

use core::error::Error;

use derive_more::Display;
use error_stack::Report;

/// Result type for collection operations.
pub type CollectResult<T> = Result<T, Report<CollectError>>;

/// Errors that can occur while collecting metric rates.
#[derive(Debug, Display)]
pub enum CollectError {
    /// Network connectivity issues
    #[display("Network error: {message}")]
    Network { message: String },

    /// Non-success HTTP status from the backend
    #[display("HTTP error: status {status}")]
    Http { status: u16 },

    /// Malformed or unexpected response body
    #[display("Parse error: {message}")]
    Parse { message: String },

    /// Metric catalog or aggregation rules could not be obtained at all
    #[display("Catalog error: {message}")]
    Catalog { message: String },

    /// Invalid configuration, detected before any collection work
    #[display("Configuration error: {message}")]
    Configuration { message: String },
}

impl Error for CollectError {}
