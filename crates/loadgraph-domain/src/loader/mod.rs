//! Batch loader engine.
//!
//! A [`BatchLoader`] collects individual `load(key)` calls issued during one
//! resolution pass and turns them into a single call to a [`BatchFn`]:
//!
//! 1. **Registration**: `load` puts the key in the open batch (once per
//!    distinct key) and subscribes the caller to that key's result cell.
//! 2. **Flush**: the pass driver calls `flush()` after issuing a level of
//!    loads. A future awaited without a flush yields once and then flushes.
//! 3. **Fan-out**: every waiter of a key receives that key's result; a failed
//!    fetch fails every key of the batch.
//!
//! Results stay cached until the loader is dropped or `clear` is called.
//! Loaders are never shared between passes.

mod cell;
mod engine;
mod group;
mod types;

pub use engine::BatchLoader;
pub use group::{group_by_key, pick_by_key};
pub use types::{BatchFn, LoadError, LoadResult, LoaderConfig, LoaderStats};
