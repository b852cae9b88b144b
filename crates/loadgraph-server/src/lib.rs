//! loadgraph-server: Request handlers and configuration
//!
//! This crate sits between the HTTP layer and the domain:
//! - Query handler that opens a fresh resolution pass per request
//! - Mutation handler that validates input before delegating
//! - Configuration management
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              loadgraph-server                │
//! ├─────────────────────────────────────────────┤
//! │  config.rs   - Configuration management     │
//! │  handlers/   - Request handlers             │
//! │    query.rs       - Read queries            │
//! │    mutation.rs    - Validated mutations     │
//! └─────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod handlers;

// Re-exports for convenience
pub use config::{ConfigLoadError, ServerConfig};
pub use handlers::{MutationError, MutationHandler, QueryHandler};
