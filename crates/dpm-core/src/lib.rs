//! Concurrent metric-rate collection engine.
//!
//! This library discovers a catalog of metric names from a Prometheus
//! compatible backend, measures each metric's ingestion rate with one
//! instant query, and aggregates the results into an immutable snapshot:
//!
//! - Requests go through a retrying client with exponential backoff
//! - The filtered catalog is split into contiguous chunks, one per worker
//! - Workers query their chunk sequentially and report through one channel
//! - Aggregation merges, filters by threshold and orders deterministically
//! - Exporter mode refreshes the snapshot on a timer behind a pull
//!   endpoint, with graceful shutdown
//!
//! # Examples
//!
//! ```no_run
//! use dpm_core::{Collector, CollectorConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CollectorConfig::new("https://prometheus.example.net")
//!     .with_credentials("user", "api-key")
//!     .with_worker_count(10)
//!     .with_min_rate(1.0);
//!
//! let collector = Collector::new(config)?;
//! let snapshot = collector.run_pass(false).await?;
//! for sample in &snapshot.rates {
//!     println!("{}: {}", sample.name, sample.rate);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod catalog;
pub mod client;
pub mod collect;
pub mod config;
pub mod error;
pub mod exporter;
pub mod exposition;
pub mod partition;
pub mod types;

pub use client::QueryClient;
pub use client::RetryPolicy;
pub use collect::Collector;
pub use config::CollectorConfig;
pub use config::QueryKind;
pub use error::CollectError;
pub use error::CollectResult;
pub use exporter::ExporterRuntime;
pub use exporter::ExporterState;
pub use types::CollectionSnapshot;
pub use types::RateSample;
