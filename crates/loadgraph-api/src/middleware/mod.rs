//! API middleware.
//!
//! Includes:
//! - Request ID generation and propagation
//! - Request logging inside a per-request span
//! - HTTP metrics collection
//! - CORS configuration

mod logging;
mod metrics;
mod request_id;

pub use logging::RequestLoggingLayer;
pub use metrics::{HttpMetricsLayer, RequestMetrics, StatusClass};
pub use request_id::{RequestId, RequestIdLayer, REQUEST_ID_HEADER};

use tower_http::cors::{Any, CorsLayer};

/// Permissive CORS: any origin, method and header.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([axum::http::HeaderName::from_static(REQUEST_ID_HEADER)])
}
