//! Batch function contract, errors and configuration for the loader.

use std::sync::Arc;

use async_trait::async_trait;

/// Bulk fetch used by a [`BatchLoader`](super::BatchLoader).
///
/// Receives the distinct keys of one batch in order of first request and
/// must return exactly one entry per key, at the same index. A key with no
/// rows is a valid (empty) value, not a missing entry. Returning `Err` fails
/// every key in the batch.
#[async_trait]
pub trait BatchFn<K, V>: Send + Sync + 'static
where
    K: Send + Sync + 'static,
    V: Send + 'static,
{
    type Error: std::error::Error + Send + Sync + 'static;

    async fn load(&self, keys: &[K]) -> Result<Vec<Result<V, Self::Error>>, Self::Error>;
}

/// Failure delivered to a waiting caller.
///
/// Errors are shared behind `Arc` so that one failure can be handed to
/// every waiter of a batch.
#[derive(Debug, thiserror::Error)]
pub enum LoadError<E> {
    /// The batch function reported an error for this key only.
    #[error("load failed for key: {0}")]
    Key(Arc<E>),

    /// The whole batch fetch failed.
    #[error("batch fetch failed: {0}")]
    Fetch(Arc<E>),

    /// The batch function returned the wrong number of results.
    #[error("batch function returned {actual} results for {expected} keys")]
    LengthMismatch { expected: usize, actual: usize },

    /// The loader was cancelled or dropped before the batch completed.
    #[error("load cancelled before its batch completed")]
    Cancelled,
}

impl<E> LoadError<E> {
    /// True for failures that break the loader contract and end the pass.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, LoadError::LengthMismatch { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadError::Cancelled)
    }
}

impl<E> Clone for LoadError<E> {
    fn clone(&self) -> Self {
        match self {
            LoadError::Key(err) => LoadError::Key(Arc::clone(err)),
            LoadError::Fetch(err) => LoadError::Fetch(Arc::clone(err)),
            LoadError::LengthMismatch { expected, actual } => LoadError::LengthMismatch {
                expected: *expected,
                actual: *actual,
            },
            LoadError::Cancelled => LoadError::Cancelled,
        }
    }
}

/// Result delivered for a single key.
pub type LoadResult<V, E> = Result<V, LoadError<E>>;

/// Loader settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Name used in logs and metric labels.
    pub name: String,
    /// Maximum keys per batch-function call. `None` sends each flush as one call.
    pub max_batch_size: Option<usize>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            name: "loader".to_string(),
            max_batch_size: None,
        }
    }
}

impl LoaderConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Caps the batch size. Zero means unlimited.
    pub fn with_max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = (max > 0).then_some(max);
        self
    }
}

/// Snapshot of loader counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Total `load` calls, including those served from cache.
    pub loads: u64,
    /// Loads answered by an existing cache entry (resolved or in flight).
    pub cache_hits: u64,
    /// Batch-function invocations.
    pub batches: u64,
    /// Keys sent to the batch function across all batches.
    pub keys_dispatched: u64,
}
