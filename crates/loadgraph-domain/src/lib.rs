//! loadgraph-domain: core loading and mutation logic
//!
//! This crate contains the storage-agnostic core:
//! - Per-request batch loader that coalesces and deduplicates key lookups
//! - Resolution passes for the user/post field tree
//! - Mutation service with typed result variants
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              loadgraph-domain                │
//! ├─────────────────────────────────────────────┤
//! │  model/     - Users, posts, input shapes    │
//! │  loader/    - Batch loader engine           │
//! │  resolver/  - Per-request resolution passes │
//! │  mutation/  - Result-variant mutations      │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod loader;
pub mod model;
pub mod mutation;
pub mod resolver;

// Re-export commonly used types at the crate root
pub use error::{DomainError, DomainResult};
pub use loader::{BatchFn, BatchLoader, LoadError, LoaderConfig};
pub use mutation::{MutationService, PostMutation, UserMutation};
pub use resolver::{PassConfig, ResolutionPass};
