//! Collector config
//!
//! This config is shared by the one-shot report path and the exporter
//! runtime; both build it from their own argument sets.

use std::time::Duration;

/// Which instant query is issued per identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryKind {
    /// Data points per minute, derived from a 5m count_over_time window.
    #[default]
    DataPointsPerMinute,
    /// Number of active series behind one metric name.
    ActiveSeries,
}

impl QueryKind {
    /// Render the query string for one identifier.
    pub fn render(&self, metric: &str) -> String {
        match self {
            Self::DataPointsPerMinute => {
                format!("count_over_time({metric}{{__ignore_usage__=\"\"}}[5m])/5")
            }
            Self::ActiveSeries => format!("count(count by (__name__) ({metric}))"),
        }
    }
}

/// Collection engine config.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// backend base url, without trailing slash
    pub endpoint: String,
    /// basic auth username
    pub username: Option<String>,
    /// basic auth password / api key
    pub api_key: Option<String>,
    /// fixed per-request timeout, distinct from the retry schedule
    pub request_timeout: Duration,
    /// per-request retry attempts
    pub max_retries: u32,
    /// initial per-request retry delay, doubled after every failure
    pub retry_delay: Duration,
    /// worker pool size for chunk processing
    pub worker_count: usize,
    /// rates at or below this value are dropped from the snapshot
    pub min_rate: f64,
    /// suppress per-item and per-attempt logging
    pub quiet: bool,
    /// identifiers ending with any of these are skipped before partitioning
    pub excluded_suffixes: Vec<String>,
    /// identifiers starting with any of these are skipped before partitioning
    pub excluded_prefixes: Vec<String>,
    /// query issued per identifier
    pub query_kind: QueryKind,
}

impl CollectorConfig {
    /// create new collector config with default parameters.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: None,
            api_key: None,
            request_timeout: Duration::from_secs(60),
            max_retries: 10,
            retry_delay: Duration::from_secs(2),
            worker_count: 10,
            min_rate: 1.0,
            quiet: false,
            excluded_suffixes: ["_count", "_bucket", "_sum"]
                .map(String::from)
                .to_vec(),
            excluded_prefixes: vec!["grafana_".to_string()],
            query_kind: QueryKind::default(),
        }
    }

    /// set basic auth credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.api_key = Some(api_key.into());
        self
    }

    /// set per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// set per-request retry budget.
    pub fn with_retry_config(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_delay = retry_delay;
        self
    }

    /// set worker pool size, clamped to at least one worker.
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count.max(1);
        self
    }

    /// set minimum rate threshold.
    pub fn with_min_rate(mut self, min_rate: f64) -> Self {
        self.min_rate = min_rate;
        self
    }

    /// set quiet flag.
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// set the per-identifier query.
    pub fn with_query_kind(mut self, query_kind: QueryKind) -> Self {
        self.query_kind = query_kind;
        self
    }

    /// instant query endpoint.
    pub fn query_url(&self) -> String {
        format!("{}/api/prom/api/v1/query", self.endpoint)
    }

    /// label values endpoint listing every metric name.
    pub fn label_values_url(&self) -> String {
        format!("{}/api/prom/api/v1/label/__name__/values", self.endpoint)
    }

    /// aggregation rules endpoint.
    pub fn aggregation_rules_url(&self) -> String {
        format!("{}/aggregations/rules", self.endpoint)
    }
}
