//! Configuration for resolution passes.

use crate::loader::LoaderConfig;

/// Loader settings applied to every pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassConfig {
    /// Maximum keys per batch-function call. Zero means unlimited.
    pub max_batch_size: usize,
}

impl PassConfig {
    /// Creates a new configuration with the specified batch cap.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    /// Loader configuration for the loader called `name`.
    pub(crate) fn loader(&self, name: &str) -> LoaderConfig {
        LoaderConfig::named(name).with_max_batch_size(self.max_batch_size)
    }
}
