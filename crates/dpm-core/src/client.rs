//! Resilient request executor.
//!
//! Every request against the backend goes through [`QueryClient`], which
//! retries transient failures (transport errors and non-success statuses)
//! with exponential backoff and returns the terminal failure as a value.
//! The retry sleeps are deliberate backpressure against an overloaded
//! backend.

use std::future::Future;
use std::time::Duration;

use error_stack::Report;
use error_stack::ResultExt;
use tracing::error;
use tracing::warn;

use crate::config::CollectorConfig;
use crate::error::CollectError;
use crate::error::CollectResult;

/// Retry schedule for one operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// total number of attempts, at least one
    pub max_retries: u32,
    /// delay before the first retry; doubles after every failed attempt
    pub initial_delay: Duration,
    /// suppress per-attempt logging, never changes the schedule
    pub quiet: bool,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            initial_delay,
            quiet: false,
        }
    }

    /// Elevated budget for the first exporter pass, which is user-visible
    /// immediately.
    pub fn initial_pass() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(2),
            quiet: false,
        }
    }

    /// Reduced, quiet budget for background refresh passes.
    pub fn background_pass() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(2),
            quiet: true,
        }
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }
}

/// Retry an arbitrary fallible operation with exponential backoff.
///
/// Used for whole collection passes in exporter mode; individual HTTP
/// requests go through [`QueryClient::get_with_retry`] instead.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> CollectResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CollectResult<T>>,
{
    let mut delay = policy.initial_delay;

    for attempt in 1..=policy.max_retries {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(report) => {
                if attempt == policy.max_retries {
                    if !policy.quiet {
                        error!(
                            operation = operation_name,
                            attempts = policy.max_retries,
                            "Operation failed after exhausting retries: {report:?}"
                        );
                    }
                    return Err(report);
                }
                if !policy.quiet {
                    warn!(
                        operation = operation_name,
                        attempt,
                        max_retries = policy.max_retries,
                        delay_sec = delay.as_secs_f32(),
                        "Operation failed, retrying after delay: {report}"
                    );
                }
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }

    unreachable!("retry loop always returns on the last attempt")
}

/// HTTP client for the backend's query interface.
#[derive(Debug, Clone)]
pub struct QueryClient {
    http: reqwest::Client,
    username: Option<String>,
    api_key: Option<String>,
}

impl QueryClient {
    /// Create a client with the fixed per-request timeout from the config.
    pub fn new(config: &CollectorConfig) -> CollectResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .change_context(CollectError::Configuration {
                message: "Failed to create HTTP client".into(),
            })?;

        Ok(Self {
            http,
            username: config.username.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Issue one GET, retrying per the policy. Returns the response on the
    /// first success, or the terminal failure once the budget is spent.
    pub async fn get_with_retry(
        &self,
        url: &str,
        params: &[(&str, &str)],
        policy: &RetryPolicy,
    ) -> CollectResult<reqwest::Response> {
        let mut delay = policy.initial_delay;

        for attempt in 1..=policy.max_retries {
            match self.try_get(url, params).await {
                Ok(response) => return Ok(response),
                Err(report) => {
                    if attempt == policy.max_retries {
                        if !policy.quiet {
                            error!(
                                url,
                                attempts = policy.max_retries,
                                "Request failed after exhausting retries: {report:?}"
                            );
                        }
                        return Err(report);
                    }
                    if !policy.quiet {
                        warn!(
                            url,
                            attempt,
                            max_retries = policy.max_retries,
                            delay_sec = delay.as_secs_f32(),
                            "Request failed, retrying after delay: {report}"
                        );
                    }
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }

        unreachable!("retry loop always returns on the last attempt")
    }

    async fn try_get(&self, url: &str, params: &[(&str, &str)]) -> CollectResult<reqwest::Response> {
        let mut request = self.http.get(url).query(params);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.api_key.as_deref());
        }

        let response = request.send().await.change_context(CollectError::Network {
            message: format!("Request to {url} failed"),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Report::new(CollectError::Http {
                status: status.as_u16(),
            }));
        }

        Ok(response)
    }
}
