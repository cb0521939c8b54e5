//! Catalog fetcher.
//!
//! Obtains the full set of metric names from the backend's label-values
//! endpoint and the aggregation rules whose target metrics must be skipped
//! to avoid double-counting. A terminal failure is returned as an `Err`
//! value; the caller decides whether that is fatal (one-shot run) or a
//! skip-this-cycle condition (exporter refresh).

use std::collections::HashSet;

use error_stack::ResultExt;
use serde::Deserialize;
use tracing::info;

use crate::client::QueryClient;
use crate::client::RetryPolicy;
use crate::config::CollectorConfig;
use crate::error::CollectError;
use crate::error::CollectResult;

/// Response of the label-values endpoint.
#[derive(Debug, Deserialize)]
pub struct LabelValuesResponse {
    pub status: String,
    #[serde(default)]
    pub data: Vec<String>,
}

/// One aggregation rule. Only the target metric matters here; the rest of
/// the rule body is backend-side configuration we never interpret.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregationRule {
    #[serde(default)]
    pub metric: Option<String>,
}

/// Fetch every metric name known to the backend.
pub async fn fetch_metric_names(
    client: &QueryClient,
    config: &CollectorConfig,
    policy: &RetryPolicy,
) -> CollectResult<Vec<String>> {
    let url = config.label_values_url();
    let response = client
        .get_with_retry(&url, &[], policy)
        .await
        .change_context(CollectError::Catalog {
            message: "Failed to retrieve metric names".into(),
        })?;

    let body: LabelValuesResponse =
        response
            .json()
            .await
            .change_context(CollectError::Catalog {
                message: "Failed to parse metric names response".into(),
            })?;

    if !config.quiet {
        info!(count = body.data.len(), "Found metrics");
    }

    Ok(body.data)
}

/// Fetch the aggregation rules. Rules without a target metric are kept in
/// the list but contribute nothing to the exclusion set.
pub async fn fetch_aggregation_rules(
    client: &QueryClient,
    config: &CollectorConfig,
    policy: &RetryPolicy,
) -> CollectResult<Vec<AggregationRule>> {
    let url = config.aggregation_rules_url();
    let response = client
        .get_with_retry(&url, &[], policy)
        .await
        .change_context(CollectError::Catalog {
            message: "Failed to retrieve aggregation rules".into(),
        })?;

    let rules: Vec<AggregationRule> =
        response
            .json()
            .await
            .change_context(CollectError::Catalog {
                message: "Failed to parse aggregation rules response".into(),
            })?;

    Ok(rules)
}

/// Build the exclusion set from aggregation rules.
pub fn exclusion_set(rules: &[AggregationRule]) -> HashSet<String> {
    rules
        .iter()
        .filter_map(|rule| rule.metric.clone())
        .collect()
}

/// Drop suffix-excluded, prefix-excluded and rule-excluded identifiers,
/// preserving the original catalog order. Computed once per pass.
pub fn filter_catalog(
    names: &[String],
    excluded: &HashSet<String>,
    config: &CollectorConfig,
) -> Vec<String> {
    names
        .iter()
        .filter(|name| {
            !config
                .excluded_suffixes
                .iter()
                .any(|suffix| name.ends_with(suffix.as_str()))
                && !config
                    .excluded_prefixes
                    .iter()
                    .any(|prefix| name.starts_with(prefix.as_str()))
                && !excluded.contains(name.as_str())
        })
        .cloned()
        .collect()
}
