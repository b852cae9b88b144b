//! Prometheus metrics infrastructure.
//!
//! Metrics are recorded through the `metrics` facade anywhere in the
//! workspace and exposed by `metrics-exporter-prometheus` on `/metrics`.
//!
//! # Metrics Exposed
//!
//! - `loadgraph_http_requests_total` - HTTP requests by method, route, status class
//! - `loadgraph_http_request_duration_seconds` - HTTP request duration
//! - `loadgraph_loader_batches_total` - Batch-function calls per loader
//! - `loadgraph_loader_batch_size` - Keys per batch
//! - `loadgraph_loader_cache_hits_total` - Loads served from a loader cache
//! - `loadgraph_loader_fetch_duration_seconds` - Batch-function duration
//! - `loadgraph_storage_query_duration_seconds` - SQL query duration
//! - `loadgraph_storage_query_timeout_total` - SQL queries that timed out
//! - `loadgraph_storage_health_check_duration_seconds` - Health check duration

use std::sync::Arc;

use axum::{extract::State, http::header::CONTENT_TYPE, response::IntoResponse};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Shared state containing the Prometheus handle for metrics rendering.
#[derive(Clone)]
pub struct MetricsState {
    handle: Arc<PrometheusHandle>,
}

impl MetricsState {
    pub fn new(handle: PrometheusHandle) -> Self {
        Self {
            handle: Arc::new(handle),
        }
    }

    /// A state backed by a recorder that is not installed globally.
    ///
    /// Renders only what is recorded through that recorder, so it suits tests
    /// that need a working `/metrics` route.
    pub fn detached() -> Self {
        Self::new(PrometheusBuilder::new().build_recorder().handle())
    }

    /// Renders the current metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Error type for metrics initialization.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("failed to install Prometheus recorder: {0}")]
    Install(String),
}

/// Installs the global Prometheus recorder and describes the known metrics.
///
/// Must be called once at startup, before anything is recorded.
pub fn init_metrics() -> Result<MetricsState, MetricsError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    describe_metrics();

    Ok(MetricsState::new(handle))
}

fn describe_metrics() {
    metrics::describe_counter!(
        "loadgraph_http_requests_total",
        "Total number of HTTP requests"
    );
    metrics::describe_histogram!(
        "loadgraph_http_request_duration_seconds",
        metrics::Unit::Seconds,
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!(
        "loadgraph_loader_batches_total",
        "Batch-function invocations by loader"
    );
    metrics::describe_histogram!(
        "loadgraph_loader_batch_size",
        metrics::Unit::Count,
        "Distinct keys sent per batch-function invocation"
    );
    metrics::describe_counter!(
        "loadgraph_loader_cache_hits_total",
        "Loads answered by an existing loader cache entry"
    );
    metrics::describe_histogram!(
        "loadgraph_loader_fetch_duration_seconds",
        metrics::Unit::Seconds,
        "Batch-function duration in seconds"
    );

    metrics::describe_histogram!(
        "loadgraph_storage_query_duration_seconds",
        metrics::Unit::Seconds,
        "Storage query duration in seconds by operation and status"
    );
    metrics::describe_counter!(
        "loadgraph_storage_query_timeout_total",
        "Storage queries that exceeded their timeout"
    );
    metrics::describe_histogram!(
        "loadgraph_storage_health_check_duration_seconds",
        metrics::Unit::Seconds,
        "Storage health check duration in seconds"
    );
}

/// Prometheus exposition format content type.
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Handler for the metrics endpoint.
pub async fn metrics_handler(State(state): State<MetricsState>) -> impl IntoResponse {
    ([(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], state.render())
}
