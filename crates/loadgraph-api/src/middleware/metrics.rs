//! HTTP metrics middleware.
//!
//! Emits through the `metrics` facade:
//!
//! - `loadgraph_http_requests_total` - labels: method, route, status_class
//! - `loadgraph_http_request_duration_seconds` - labels: method, route, status_class
//!
//! `route` is the matched route template (`/users/:id`), never the raw path.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    task::{Context, Poll},
    time::{Duration, Instant},
};

use axum::{
    extract::MatchedPath,
    http::{Request, Response, StatusCode},
};
use tower::{Layer, Service};

/// Coarse status bucket used as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    ClientError,
    ServerError,
    Other,
}

impl StatusClass {
    pub fn of(status: StatusCode) -> Self {
        if status.is_success() {
            StatusClass::Success
        } else if status.is_client_error() {
            StatusClass::ClientError
        } else if status.is_server_error() {
            StatusClass::ServerError
        } else {
            StatusClass::Other
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StatusClass::Success => "2xx",
            StatusClass::ClientError => "4xx",
            StatusClass::ServerError => "5xx",
            StatusClass::Other => "other",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// In-process request counters, mirrored to the `metrics` facade.
#[derive(Debug, Default)]
pub struct RequestMetrics {
    by_class: [AtomicU64; 4],
    total_duration_us: AtomicU64,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, method: &str, route: &str, status: StatusCode, elapsed: Duration) {
        let class = StatusClass::of(status);
        self.by_class[class.index()].fetch_add(1, Ordering::Relaxed);
        self.total_duration_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);

        let labels = [
            ("method", method.to_string()),
            ("route", route.to_string()),
            ("status_class", class.label().to_string()),
        ];
        metrics::counter!("loadgraph_http_requests_total", &labels).increment(1);
        metrics::histogram!("loadgraph_http_request_duration_seconds", &labels)
            .record(elapsed.as_secs_f64());
    }

    /// Requests recorded in `class`.
    pub fn count(&self, class: StatusClass) -> u64 {
        self.by_class[class.index()].load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.by_class
            .iter()
            .map(|counter| counter.load(Ordering::Relaxed))
            .sum()
    }

    pub fn total_duration(&self) -> Duration {
        Duration::from_micros(self.total_duration_us.load(Ordering::Relaxed))
    }
}

/// Layer that records every response into a shared [`RequestMetrics`].
#[derive(Clone, Default)]
pub struct HttpMetricsLayer {
    metrics: Arc<RequestMetrics>,
}

impl HttpMetricsLayer {
    pub fn new(metrics: Arc<RequestMetrics>) -> Self {
        Self { metrics }
    }

    pub fn metrics(&self) -> Arc<RequestMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl<S> Layer<S> for HttpMetricsLayer {
    type Service = HttpMetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        HttpMetricsService {
            inner,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

#[derive(Clone)]
pub struct HttpMetricsService<S> {
    inner: S,
    metrics: Arc<RequestMetrics>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for HttpMetricsService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let start = Instant::now();
        let method = request.method().to_string();
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| "unmatched".to_string());
        let metrics = Arc::clone(&self.metrics);
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let response = inner.call(request).await?;
            metrics.record(&method, &route, response.status(), start.elapsed());
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert_eq!(StatusClass::of(StatusCode::OK), StatusClass::Success);
        assert_eq!(StatusClass::of(StatusCode::NOT_FOUND), StatusClass::ClientError);
        assert_eq!(
            StatusClass::of(StatusCode::SERVICE_UNAVAILABLE),
            StatusClass::ServerError
        );
        assert_eq!(StatusClass::of(StatusCode::SWITCHING_PROTOCOLS), StatusClass::Other);
        assert_eq!(StatusClass::ServerError.label(), "5xx");
    }

    #[test]
    fn test_record_counts_per_class() {
        let metrics = RequestMetrics::new();
        metrics.record("GET", "/users", StatusCode::OK, Duration::from_micros(100));
        metrics.record("POST", "/users", StatusCode::CREATED, Duration::from_micros(200));
        metrics.record("GET", "/users/:id", StatusCode::NOT_FOUND, Duration::from_micros(50));
        metrics.record("GET", "/ready", StatusCode::SERVICE_UNAVAILABLE, Duration::ZERO);

        assert_eq!(metrics.total(), 4);
        assert_eq!(metrics.count(StatusClass::Success), 2);
        assert_eq!(metrics.count(StatusClass::ClientError), 1);
        assert_eq!(metrics.count(StatusClass::ServerError), 1);
        assert_eq!(metrics.total_duration(), Duration::from_micros(350));
    }
}
