//! loadgraph-api: HTTP API layer
//!
//! This crate provides the API layer including:
//! - HTTP REST endpoints via Axum
//! - Adapters from the storage layer to the domain traits
//! - Middleware (request ids, logging, metrics)
//! - Observability setup (logging, Prometheus)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               loadgraph-api                  │
//! ├─────────────────────────────────────────────┤
//! │  http/          - HTTP REST endpoints       │
//! │  adapters.rs    - Storage to domain bridge  │
//! │  middleware/    - Request id, logs, metrics │
//! │  observability/ - Logging and Prometheus    │
//! └─────────────────────────────────────────────┘
//! ```

pub mod adapters;
pub mod http;
pub mod middleware;
pub mod observability;
