//! Integration tests for dpm-core against a fake Prometheus backend.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use dpm_core::client::retry_with_backoff;
use dpm_core::exposition;
use dpm_core::Collector;
use dpm_core::CollectorConfig;
use dpm_core::ExporterRuntime;
use dpm_core::ExporterState;
use dpm_core::QueryClient;
use dpm_core::RateSample;
use dpm_core::RetryPolicy;
use poem::handler;
use poem::http::StatusCode;
use poem::listener::Acceptor;
use poem::listener::Listener;
use poem::listener::TcpListener;
use poem::web::Data;
use poem::web::Query;
use poem::EndpointExt;
use poem::IntoResponse;
use poem::Response;
use poem::Route;
use poem::Server;
use serde_json::json;
use similar_asserts::assert_eq;

/// In-memory stand-in for the backend's query interface.
struct FakeBackend {
    metric_names: Vec<String>,
    rule_targets: Vec<String>,
    rates: HashMap<String, f64>,
    /// metrics whose instant query answers with a garbage body
    malformed: Vec<String>,
    fail_catalog: AtomicBool,
    requests: AtomicUsize,
}

impl FakeBackend {
    fn new(names: &[&str], rule_targets: &[&str], rates: &[(&str, f64)]) -> Arc<Self> {
        Arc::new(Self {
            metric_names: names.iter().map(|s| s.to_string()).collect(),
            rule_targets: rule_targets.iter().map(|s| s.to_string()).collect(),
            rates: rates.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            malformed: Vec::new(),
            fail_catalog: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
        })
    }

    fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[handler]
fn label_values(Data(backend): Data<&Arc<FakeBackend>>) -> Response {
    backend.requests.fetch_add(1, Ordering::SeqCst);
    if backend.fail_catalog.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    poem::web::Json(json!({ "status": "success", "data": backend.metric_names })).into_response()
}

#[handler]
fn aggregation_rules(Data(backend): Data<&Arc<FakeBackend>>) -> Response {
    backend.requests.fetch_add(1, Ordering::SeqCst);
    if backend.fail_catalog.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let rules: Vec<_> = backend
        .rule_targets
        .iter()
        .map(|metric| json!({ "metric": metric }))
        .collect();
    poem::web::Json(json!(rules)).into_response()
}

#[handler]
fn instant_query(
    Data(backend): Data<&Arc<FakeBackend>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    backend.requests.fetch_add(1, Ordering::SeqCst);
    let query = params.get("query").cloned().unwrap_or_default();
    if backend
        .malformed
        .iter()
        .any(|name| query.contains(&format!("({name}{{")))
    {
        return "definitely not json".into_response();
    }
    let rate = backend
        .rates
        .iter()
        .find(|(name, _)| query.contains(&format!("({name}{{")))
        .map(|(_, rate)| *rate);

    let result = match rate {
        Some(rate) => json!([{ "metric": {}, "value": [1712000000.0, rate.to_string()] }]),
        None => json!([]),
    };
    poem::web::Json(json!({
        "status": "success",
        "data": { "resultType": "vector", "result": result }
    }))
    .into_response()
}

/// Serve the fake backend on an ephemeral port, returning its base URL.
async fn spawn_backend(backend: Arc<FakeBackend>) -> String {
    let acceptor = TcpListener::bind("127.0.0.1:0")
        .into_acceptor()
        .await
        .expect("should bind fake backend");
    let addr = acceptor
        .local_addr()
        .into_iter()
        .next()
        .and_then(|local| local.as_socket_addr().copied())
        .expect("should have a socket address");

    let app = Route::new()
        .at("/api/prom/api/v1/label/__name__/values", label_values)
        .at("/aggregations/rules", aggregation_rules)
        .at("/api/prom/api/v1/query", instant_query)
        .data(backend);
    tokio::spawn(async move {
        let _ = Server::new_with_acceptor(acceptor).run(app).await;
    });

    format!("http://{addr}")
}

fn fast_config(endpoint: &str) -> CollectorConfig {
    CollectorConfig::new(endpoint)
        .with_credentials("user", "api-key")
        .with_request_timeout(Duration::from_secs(5))
        .with_retry_config(1, Duration::from_millis(10))
        .with_quiet(true)
}

#[tokio::test]
async fn end_to_end_pass_filters_and_measures() {
    let backend = FakeBackend::new(&["a_count", "b", "c_bucket", "d"], &["d"], &[("b", 5.0)]);
    let endpoint = spawn_backend(backend).await;
    let collector = Collector::new(fast_config(&endpoint)).expect("should build collector");

    let snapshot = collector.run_pass(true).await.expect("pass should succeed");

    assert_eq!(snapshot.rates, vec![RateSample::new("b", 5.0)]);
    assert_eq!(snapshot.items_processed, 1);
    assert!(snapshot.last_update.is_some());
}

#[tokio::test]
async fn rates_at_or_below_threshold_are_dropped_and_order_is_descending() {
    let backend = FakeBackend::new(&["x", "y"], &[], &[("x", 0.5), ("y", 3.0)]);
    let endpoint = spawn_backend(backend).await;
    let collector = Collector::new(fast_config(&endpoint).with_min_rate(1.0))
        .expect("should build collector");

    let snapshot = collector.run_pass(true).await.expect("pass should succeed");

    assert_eq!(snapshot.rates, vec![RateSample::new("y", 3.0)]);
    assert_eq!(snapshot.items_processed, 2, "x still counts as processed");
}

#[tokio::test]
async fn metrics_without_usable_values_are_absent_from_results() {
    // "ghost" is in the catalog but the backend has no samples for it.
    let backend = FakeBackend::new(&["ghost", "real"], &[], &[("real", 2.0)]);
    let endpoint = spawn_backend(backend).await;
    let collector = Collector::new(fast_config(&endpoint)).expect("should build collector");

    let snapshot = collector.run_pass(true).await.expect("pass should succeed");

    assert_eq!(snapshot.rates, vec![RateSample::new("real", 2.0)]);
}

#[tokio::test]
async fn catalog_failure_aborts_the_pass() {
    let backend = FakeBackend::new(&["b"], &[], &[("b", 5.0)]);
    backend.fail_catalog.store(true, Ordering::SeqCst);
    let endpoint = spawn_backend(backend).await;
    // One attempt per request keeps the failing path fast.
    let config = fast_config(&endpoint);
    let collector = Collector::new(config).expect("should build collector");

    let result = retry_with_backoff(
        &RetryPolicy::new(1, Duration::from_millis(10)).with_quiet(true),
        "test pass",
        || collector.run_pass(true),
    )
    .await;

    assert!(result.is_err(), "catalog failure must abort the pass");
}

#[tokio::test]
async fn failed_refresh_keeps_the_previous_snapshot() {
    let backend = FakeBackend::new(&["b"], &[], &[("b", 5.0)]);
    let endpoint = spawn_backend(backend.clone()).await;
    let collector = Collector::new(fast_config(&endpoint)).expect("should build collector");
    let state = Arc::new(ExporterState::new());
    let fast_policy = RetryPolicy::new(1, Duration::from_millis(10)).with_quiet(true);
    let runtime = ExporterRuntime::new(collector, state.clone(), Duration::from_millis(50))
        .with_retry_policies(fast_policy.clone(), fast_policy);

    let token = tokio_util::sync::CancellationToken::new();
    let runtime_task = tokio::spawn({
        let token = token.clone();
        async move { runtime.run(token).await }
    });

    // Wait for the initial pass to publish.
    let mut first = state.current();
    for _ in 0..100 {
        first = state.current();
        if !first.rates.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(first.rates, vec![RateSample::new("b", 5.0)]);

    // Every refresh cycle from here on fails at the catalog step.
    backend.fail_catalog.store(true, Ordering::SeqCst);
    let requests_before = backend.request_count();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(
        backend.request_count() > requests_before,
        "refresh cycles should have been attempted while the catalog fails"
    );
    let current = state.current();
    assert_eq!(
        current.rates,
        vec![RateSample::new("b", 5.0)],
        "a failed refresh must not clear previously published data"
    );
    assert_eq!(
        current.last_update, first.last_update,
        "a failed refresh must not republish the snapshot"
    );

    token.cancel();
    runtime_task.await.expect("runtime task should join");
}

#[tokio::test]
async fn malformed_query_bodies_skip_the_item_but_not_the_pass() {
    let backend = Arc::new(FakeBackend {
        metric_names: vec!["garbled".to_string(), "ok".to_string()],
        rule_targets: Vec::new(),
        rates: HashMap::from([("ok".to_string(), 4.0)]),
        malformed: vec!["garbled".to_string()],
        fail_catalog: AtomicBool::new(false),
        requests: AtomicUsize::new(0),
    });
    let endpoint = spawn_backend(backend).await;
    let collector = Collector::new(fast_config(&endpoint)).expect("should build collector");

    let snapshot = collector.run_pass(true).await.expect("pass should succeed");

    assert_eq!(snapshot.rates, vec![RateSample::new("ok", 4.0)]);
    assert_eq!(
        snapshot.items_processed, 2,
        "the garbled metric still counts as processed"
    );
}

#[tokio::test]
async fn cancelled_runtime_makes_no_request_attempts() {
    let backend = FakeBackend::new(&["b"], &[], &[("b", 5.0)]);
    let endpoint = spawn_backend(backend.clone()).await;
    let collector = Collector::new(fast_config(&endpoint)).expect("should build collector");
    let state = Arc::new(ExporterState::new());
    let runtime = ExporterRuntime::new(collector, state, Duration::from_millis(10));

    let token = tokio_util::sync::CancellationToken::new();
    token.cancel();
    runtime.run(token).await;

    assert_eq!(
        backend.request_count(),
        0,
        "no requests may be sent after the shutdown signal"
    );
}

#[tokio::test]
async fn exporter_serves_the_snapshot_after_the_initial_pass() {
    let backend = FakeBackend::new(&["a_count", "b", "c_bucket", "d"], &["d"], &[("b", 5.0)]);
    let endpoint = spawn_backend(backend).await;
    let collector = Collector::new(fast_config(&endpoint)).expect("should build collector");
    let state = Arc::new(ExporterState::new());
    let runtime = ExporterRuntime::new(collector, state.clone(), Duration::from_secs(3600));

    let bound = exposition::bind("127.0.0.1:0").await.expect("should bind");
    let base_url = format!("http://{}", bound.local_addr());
    let token = tokio_util::sync::CancellationToken::new();
    tokio::spawn({
        let state = state.clone();
        let token = token.clone();
        async move {
            let _ = bound.serve(state, token).await;
        }
    });
    let runtime_task = tokio::spawn({
        let token = token.clone();
        async move { runtime.run(token).await }
    });

    // The endpoint answers with a zeroed snapshot even before the first
    // pass lands, then picks up the published data.
    let mut body = String::new();
    for _ in 0..100 {
        body = reqwest::get(format!("{base_url}/metrics"))
            .await
            .expect("endpoint should stay responsive")
            .text()
            .await
            .expect("should read body");
        if body.contains("metric_dpm_rate{metric_name=\"b\"} 5") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(
        body.contains("metric_dpm_rate{metric_name=\"b\"} 5"),
        "snapshot should be exposed after the initial pass: {body}"
    );
    assert!(body.contains("dpm_finder_metrics_processed_total 1"));

    token.cancel();
    runtime_task.await.expect("runtime task should join");
}

#[tokio::test]
async fn client_retries_transient_statuses_until_success() {
    // Fails twice, then succeeds.
    struct Flaky {
        remaining_failures: AtomicUsize,
        requests: AtomicUsize,
    }

    #[handler]
    fn flaky(Data(state): Data<&Arc<Flaky>>) -> Response {
        state.requests.fetch_add(1, Ordering::SeqCst);
        let left = state.remaining_failures.load(Ordering::SeqCst);
        if left > 0 {
            state.remaining_failures.store(left - 1, Ordering::SeqCst);
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
        poem::web::Json(json!({ "status": "success", "data": [] })).into_response()
    }

    let state = Arc::new(Flaky {
        remaining_failures: AtomicUsize::new(2),
        requests: AtomicUsize::new(0),
    });
    let acceptor = TcpListener::bind("127.0.0.1:0")
        .into_acceptor()
        .await
        .expect("should bind");
    let addr = acceptor
        .local_addr()
        .into_iter()
        .next()
        .and_then(|local| local.as_socket_addr().copied())
        .expect("should have a socket address");
    let app = Route::new().at("/flaky", flaky).data(state.clone());
    tokio::spawn(async move {
        let _ = Server::new_with_acceptor(acceptor).run(app).await;
    });

    let config = fast_config(&format!("http://{addr}"));
    let client = QueryClient::new(&config).expect("should build client");
    let policy = RetryPolicy::new(5, Duration::from_millis(10)).with_quiet(true);

    let response = client
        .get_with_retry(&format!("http://{addr}/flaky"), &[], &policy)
        .await
        .expect("should succeed after retries");

    assert!(response.status().is_success());
    assert_eq!(state.requests.load(Ordering::SeqCst), 3);
}
