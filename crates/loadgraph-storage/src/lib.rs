//! loadgraph-storage: Storage abstraction layer
//!
//! This crate provides the storage abstraction for loadgraph, including:
//! - DataStore trait for user and post operations
//! - In-memory implementation for tests and ephemeral runs
//! - SQLite implementation with migrations and cascading deletes
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │             loadgraph-storage                │
//! ├─────────────────────────────────────────────┤
//! │  traits.rs - DataStore trait definition     │
//! │  memory.rs - In-memory implementation       │
//! │  sqlite.rs - SQLite implementation          │
//! │  seed.rs   - Sample data                    │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod memory;
pub mod seed;
pub mod sqlite;
pub mod traits;

// Re-export commonly used types
pub use error::{StorageError, StorageResult};
pub use memory::MemoryDataStore;
pub use seed::{sample_dataset, seed};
pub use sqlite::{SqliteConfig, SqliteDataStore};
pub use traits::{
    DataStore, Dataset, HealthStatus, NewPostRow, NewUserRow, PostChanges, PostRow, UserChanges,
    UserRow, WriteOutcome,
};
