//! Application state for HTTP handlers.

use std::sync::Arc;

use loadgraph_domain::resolver::PassConfig;
use loadgraph_server::{MutationHandler, QueryHandler};
use loadgraph_storage::DataStore;

use crate::adapters::DataStoreAdapter;

/// Application state shared across all HTTP handlers.
///
/// One [`DataStoreAdapter`] serves both handlers; the query handler opens a
/// fresh resolution pass for every request it serves.
pub struct AppState<S: DataStore> {
    pub storage: Arc<S>,
    pub queries: QueryHandler<DataStoreAdapter<S>, DataStoreAdapter<S>>,
    pub mutations: MutationHandler<DataStoreAdapter<S>>,
}

impl<S: DataStore> AppState<S> {
    /// Creates a state with unlimited loader batches.
    pub fn new(storage: Arc<S>) -> Self {
        Self::with_pass_config(storage, PassConfig::default())
    }

    pub fn with_pass_config(storage: Arc<S>, pass_config: PassConfig) -> Self {
        let adapter = Arc::new(DataStoreAdapter::new(Arc::clone(&storage)));

        Self {
            queries: QueryHandler::new(Arc::clone(&adapter), Arc::clone(&adapter), pass_config),
            mutations: MutationHandler::new(adapter),
            storage,
        }
    }
}
