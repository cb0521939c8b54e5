use std::time::Duration;

use anyhow::bail;
use anyhow::Result;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use dpm_core::CollectorConfig;
use dpm_core::QueryKind;

/// Calculate data points per minute (DPM) for every metric in a
/// Prometheus compatible backend, either as a one-shot report or as a
/// continuously refreshed exporter.
#[derive(Parser)]
#[command(name = "dpm-finder", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one collection pass and write a report file
    Report(ReportArgs),
    /// Serve the latest snapshot on a pull endpoint, refreshing on a timer
    Exporter(ExporterArgs),
}

/// Backend connection and collection parameters, shared by both modes.
#[derive(Args, Clone)]
pub struct ConnectionArgs {
    #[arg(
        long,
        env = "PROMETHEUS_ENDPOINT",
        help = "Base URL of the Prometheus compatible backend"
    )]
    pub endpoint: String,

    #[arg(long, env = "PROMETHEUS_USERNAME", help = "Basic auth username")]
    pub username: String,

    #[arg(long, env = "PROMETHEUS_API_KEY", help = "Basic auth API key")]
    pub api_key: String,

    #[arg(
        long,
        default_value = "60",
        help = "Request timeout in seconds for backend API calls"
    )]
    pub timeout: u64,

    #[arg(
        short = 't',
        long,
        default_value = "10",
        help = "Number of concurrent workers for processing metrics (minimum: 1)"
    )]
    pub threads: usize,

    #[arg(
        short = 'm',
        long,
        default_value = "1.0",
        help = "Minimum DPM threshold; only metrics strictly above it are reported"
    )]
    pub min_dpm: f64,

    #[arg(
        long,
        value_enum,
        default_value_t = QueryKindArg::Dpm,
        help = "Per-metric measurement: ingestion rate or active series count"
    )]
    pub query: QueryKindArg,

    #[arg(short = 'q', long, help = "Suppress progress output")]
    pub quiet: bool,

    #[arg(short = 'v', long, help = "Enable debug logging for detailed output")]
    pub verbose: bool,
}

impl ConnectionArgs {
    /// Validate configuration-fatal conditions and build the collector
    /// config. Runs before any collection work.
    pub fn to_collector_config(&self) -> Result<CollectorConfig> {
        if self.timeout < 1 {
            bail!("Invalid timeout {}, must be at least 1 second", self.timeout);
        }
        if self.threads < 1 {
            tracing::warn!(
                threads = self.threads,
                "Thread count is less than 1, setting to 1"
            );
        }

        Ok(CollectorConfig::new(self.endpoint.trim_end_matches('/'))
            .with_credentials(&self.username, &self.api_key)
            .with_request_timeout(Duration::from_secs(self.timeout))
            .with_worker_count(self.threads)
            .with_min_rate(self.min_dpm)
            .with_query_kind(self.query.into())
            .with_quiet(self.quiet))
    }
}

#[derive(Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value_t = OutputFormat::Csv,
        help = "Output format"
    )]
    pub format: OutputFormat,

    #[arg(short = 'o', long, help = "Output file path (defaults to the format's file name)")]
    pub output: Option<std::path::PathBuf>,
}

#[derive(Args)]
pub struct ExporterArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[arg(
        short = 'p',
        long,
        default_value = "9966",
        help = "Port to run the exporter server on"
    )]
    pub port: u16,

    #[arg(
        short = 'u',
        long,
        default_value = "86400",
        help = "How often to refresh metrics, in seconds"
    )]
    pub update_interval: u64,
}

impl ExporterArgs {
    pub fn validate(&self) -> Result<()> {
        if self.port < 1 {
            bail!("Invalid port {}, must be between 1 and 65535", self.port);
        }
        if self.update_interval < 30 {
            tracing::warn!(
                interval_sec = self.update_interval,
                "Update interval is very short, consider using 30s or more"
            );
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    #[value(alias = "txt")]
    Text,
    Json,
    Prom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QueryKindArg {
    /// Data points per minute
    Dpm,
    /// Active series count
    ActiveSeries,
}

impl From<QueryKindArg> for QueryKind {
    fn from(value: QueryKindArg) -> Self {
        match value {
            QueryKindArg::Dpm => Self::DataPointsPerMinute,
            QueryKindArg::ActiveSeries => Self::ActiveSeries,
        }
    }
}
