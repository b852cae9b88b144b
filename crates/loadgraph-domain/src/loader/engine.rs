//! Per-pass batch loader.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use super::cell::{ResultCell, Subscription};
use super::types::{BatchFn, LoadError, LoadResult, LoaderConfig, LoaderStats};

type Cell<V, E> = ResultCell<LoadResult<V, E>>;

struct CacheEntry<V, E> {
    cell: Arc<Cell<V, E>>,
    /// Id of the batch the cell was registered in.
    batch: u64,
}

/// Keys accumulated since the last flush, distinct and in request order.
struct OpenBatch<K, V, E> {
    id: u64,
    keys: Vec<K>,
    cells: Vec<Arc<Cell<V, E>>>,
    index: HashMap<K, usize>,
}

impl<K: Eq + Hash + Clone, V, E> OpenBatch<K, V, E> {
    fn new(id: u64) -> Self {
        Self {
            id,
            keys: Vec::new(),
            cells: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn push(&mut self, key: K, cell: Arc<Cell<V, E>>) {
        self.index.insert(key.clone(), self.keys.len());
        self.keys.push(key);
        self.cells.push(cell);
    }

    fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

struct State<K, V, E> {
    cache: HashMap<K, CacheEntry<V, E>>,
    open: OpenBatch<K, V, E>,
    /// Set once a batch function breaks its contract; every later load fails.
    poisoned: Option<LoadError<E>>,
}

impl<K: Eq + Hash + Clone, V, E> State<K, V, E> {
    fn take_open(&mut self) -> OpenBatch<K, V, E> {
        let next = OpenBatch::new(self.open.id + 1);
        std::mem::replace(&mut self.open, next)
    }
}

#[derive(Default)]
struct Counters {
    loads: AtomicU64,
    cache_hits: AtomicU64,
    batches: AtomicU64,
    keys_dispatched: AtomicU64,
}

enum Ticket<V, E> {
    Ready(LoadResult<V, E>),
    Waiting {
        receiver: tokio::sync::oneshot::Receiver<LoadResult<V, E>>,
        batch: u64,
    },
}

impl<V: Clone, E> Ticket<V, E> {
    fn subscribe(cell: &Cell<V, E>, batch: u64) -> Self {
        match cell.subscribe() {
            Subscription::Ready(result) => Ticket::Ready(result),
            Subscription::Waiting(receiver) => Ticket::Waiting { receiver, batch },
        }
    }
}

struct Inner<K, V, F>
where
    K: Send + Sync + 'static,
    V: Send + 'static,
    F: BatchFn<K, V>,
{
    batch_fn: Arc<F>,
    config: LoaderConfig,
    state: Mutex<State<K, V, F::Error>>,
    counters: Counters,
}

/// Batching, deduplicating loader scoped to one resolution pass.
///
/// `load` registers its key synchronously and returns a future. Keys
/// registered before the next flush are sent to the batch function in one
/// call. The flush happens either when the pass driver calls [`flush`] or,
/// failing that, when a waiting future is polled after one cooperative
/// yield, so every load issued in the same scheduling tick shares a batch.
///
/// Results are cached for the lifetime of the loader, failures included.
/// Use [`clear`] to retry a key.
///
/// [`flush`]: BatchLoader::flush
/// [`clear`]: BatchLoader::clear
pub struct BatchLoader<K, V, F>
where
    K: Send + Sync + 'static,
    V: Send + 'static,
    F: BatchFn<K, V>,
{
    inner: Arc<Inner<K, V, F>>,
}

impl<K, V, F> Clone for BatchLoader<K, V, F>
where
    K: Send + Sync + 'static,
    V: Send + 'static,
    F: BatchFn<K, V>,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, F> BatchLoader<K, V, F>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: BatchFn<K, V>,
{
    /// Creates a loader with default configuration.
    pub fn new(batch_fn: F) -> Self {
        Self::with_config(batch_fn, LoaderConfig::default())
    }

    pub fn with_config(batch_fn: F, config: LoaderConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                batch_fn: Arc::new(batch_fn),
                config,
                state: Mutex::new(State {
                    cache: HashMap::new(),
                    open: OpenBatch::new(0),
                    poisoned: None,
                }),
                counters: Counters::default(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Requests the value for `key`.
    ///
    /// The key joins the open batch immediately; the returned future only
    /// waits. Awaiting it without an explicit flush triggers one after a
    /// single yield.
    pub fn load(&self, key: K) -> impl Future<Output = LoadResult<V, F::Error>> + Send + 'static {
        let ticket = self.inner.register(key);
        let inner = Arc::downgrade(&self.inner);
        async move {
            match ticket {
                Ticket::Ready(result) => result,
                Ticket::Waiting { receiver, batch } => {
                    auto_flush(inner, batch).await;
                    receiver.await.unwrap_or(Err(LoadError::Cancelled))
                }
            }
        }
    }

    /// Loads every key and returns results in input order, duplicates included.
    pub fn load_many(
        &self,
        keys: impl IntoIterator<Item = K>,
    ) -> impl Future<Output = Vec<LoadResult<V, F::Error>>> + Send + 'static {
        let pending: Vec<_> = keys.into_iter().map(|key| self.load(key)).collect();
        join_all(pending)
    }

    /// Like [`load_many`](Self::load_many) but fails on the first error.
    pub fn try_load_many(
        &self,
        keys: impl IntoIterator<Item = K>,
    ) -> impl Future<Output = Result<Vec<V>, LoadError<F::Error>>> + Send + 'static {
        let all = self.load_many(keys);
        async move { all.await.into_iter().collect() }
    }

    /// Dispatches every pending key and waits for the results to be stored.
    ///
    /// Returns the number of keys dispatched, or the contract violation
    /// that poisoned this loader.
    pub async fn flush(&self) -> Result<usize, LoadError<F::Error>> {
        let open = {
            let mut state = self.inner.state.lock();
            if let Some(err) = &state.poisoned {
                return Err(err.clone());
            }
            if state.open.is_empty() {
                return Ok(0);
            }
            state.take_open()
        };

        let dispatched = open.keys.len();
        Inner::dispatch(&self.inner, open).await;

        match self.inner.state.lock().poisoned.clone() {
            Some(err) => Err(err),
            None => Ok(dispatched),
        }
    }

    /// Removes one cache entry. Returns whether an entry existed.
    pub fn clear(&self, key: &K) -> bool {
        self.inner.state.lock().cache.remove(key).is_some()
    }

    pub fn clear_all(&self) {
        self.inner.state.lock().cache.clear();
    }

    /// Seeds the cache with a known value. Existing entries are kept.
    pub fn prime(&self, key: K, value: V) -> bool {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        if state.cache.contains_key(&key) {
            return false;
        }
        let entry = CacheEntry {
            cell: Arc::new(ResultCell::resolved(Ok(value))),
            batch: state.open.id,
        };
        state.cache.insert(key, entry);
        true
    }

    /// Releases every undispatched key as cancelled without calling the
    /// batch function. In-flight batches are unaffected.
    pub fn cancel(&self) -> usize {
        self.inner.cancel_open()
    }

    /// Number of keys waiting for the next flush.
    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().open.keys.len()
    }

    pub fn stats(&self) -> LoaderStats {
        let counters = &self.inner.counters;
        LoaderStats {
            loads: counters.loads.load(Ordering::Relaxed),
            cache_hits: counters.cache_hits.load(Ordering::Relaxed),
            batches: counters.batches.load(Ordering::Relaxed),
            keys_dispatched: counters.keys_dispatched.load(Ordering::Relaxed),
        }
    }
}

/// Flushes `batch` on behalf of a waiting future that nobody flushed for.
async fn auto_flush<K, V, F>(inner: Weak<Inner<K, V, F>>, batch: u64)
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: BatchFn<K, V>,
{
    let still_open = inner
        .upgrade()
        .is_some_and(|inner| inner.is_open(batch));
    if !still_open {
        return;
    }

    // Let every other runnable resolver register its keys first.
    tokio::task::yield_now().await;

    if let Some(inner) = inner.upgrade() {
        let open = {
            let mut state = inner.state.lock();
            if state.open.id != batch || state.open.is_empty() {
                return;
            }
            state.take_open()
        };
        Inner::dispatch(&inner, open).await;
    }
}

impl<K, V, F> Inner<K, V, F>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: BatchFn<K, V>,
{
    fn register(&self, key: K) -> Ticket<V, F::Error> {
        self.counters.loads.fetch_add(1, Ordering::Relaxed);

        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(err) = &state.poisoned {
            return Ticket::Ready(Err(err.clone()));
        }

        if let Some(entry) = state.cache.get(&key) {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(
                "loadgraph_loader_cache_hits_total",
                "loader" => self.config.name.clone()
            )
            .increment(1);
            return Ticket::subscribe(&entry.cell, entry.batch);
        }

        // A cleared key that is still waiting in the open batch rejoins it
        // instead of being queued twice.
        let batch = state.open.id;
        let cell = match state.open.index.get(&key).copied() {
            Some(position) => Arc::clone(&state.open.cells[position]),
            None => {
                let cell = Arc::new(ResultCell::pending());
                state.open.push(key.clone(), Arc::clone(&cell));
                cell
            }
        };
        state.cache.insert(
            key,
            CacheEntry {
                cell: Arc::clone(&cell),
                batch,
            },
        );
        Ticket::subscribe(&cell, batch)
    }

    fn is_open(&self, batch: u64) -> bool {
        let state = self.state.lock();
        state.open.id == batch && !state.open.is_empty()
    }

    fn cancel_open(&self) -> usize {
        let open = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let open = state.take_open();
            for key in &open.keys {
                if state.cache.get(key).is_some_and(|entry| entry.batch == open.id) {
                    state.cache.remove(key);
                }
            }
            open
        };

        for cell in &open.cells {
            cell.resolve(Err(LoadError::Cancelled));
        }
        if !open.is_empty() {
            debug!(loader = %self.config.name, keys = open.keys.len(), "cancelled pending batch");
        }
        open.keys.len()
    }

    /// Sends the batch (split by `max_batch_size`) and stores the results.
    ///
    /// Each chunk runs on its own task so an in-flight fetch completes even
    /// if the caller stops waiting.
    async fn dispatch(inner: &Arc<Self>, open: OpenBatch<K, V, F::Error>) {
        let total = open.keys.len();
        let chunk_size = inner.config.max_batch_size.unwrap_or(total).max(1);

        debug!(
            loader = %inner.config.name,
            batch = open.id,
            keys = total,
            chunk_size,
            "dispatching batch"
        );

        let tasks: Vec<_> = open
            .keys
            .chunks(chunk_size)
            .zip(open.cells.chunks(chunk_size))
            .map(|(keys, cells)| {
                let keys = keys.to_vec();
                let cells = cells.to_vec();

                inner.counters.batches.fetch_add(1, Ordering::Relaxed);
                inner
                    .counters
                    .keys_dispatched
                    .fetch_add(keys.len() as u64, Ordering::Relaxed);
                metrics::counter!(
                    "loadgraph_loader_batches_total",
                    "loader" => inner.config.name.clone()
                )
                .increment(1);
                metrics::histogram!(
                    "loadgraph_loader_batch_size",
                    "loader" => inner.config.name.clone()
                )
                .record(keys.len() as f64);

                let handle = tokio::spawn(execute_batch(
                    Arc::clone(&inner.batch_fn),
                    inner.config.name.clone(),
                    keys,
                    cells.clone(),
                ));
                async move { (handle.await, cells) }
            })
            .collect();

        for (outcome, cells) in join_all(tasks).await {
            match outcome {
                Ok(None) => {}
                Ok(Some(violation)) => {
                    let mut state = inner.state.lock();
                    if state.poisoned.is_none() {
                        state.poisoned = Some(violation);
                    }
                }
                Err(join_error) => {
                    error!(
                        loader = %inner.config.name,
                        error = %join_error,
                        "batch task aborted"
                    );
                    for cell in &cells {
                        cell.resolve(Err(LoadError::Cancelled));
                    }
                }
            }
        }
    }
}

/// Runs one batch-function call and fans the results out.
///
/// Returns the contract violation, if the function broke the length rule.
async fn execute_batch<K, V, F>(
    batch_fn: Arc<F>,
    loader: String,
    keys: Vec<K>,
    cells: Vec<Arc<Cell<V, F::Error>>>,
) -> Option<LoadError<F::Error>>
where
    K: Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: BatchFn<K, V>,
{
    let started = Instant::now();
    let expected = keys.len();

    let violation = match batch_fn.load(&keys).await {
        Ok(values) if values.len() == expected => {
            for (cell, value) in cells.iter().zip(values) {
                cell.resolve(value.map_err(|err| LoadError::Key(Arc::new(err))));
            }
            None
        }
        Ok(values) => {
            let violation = LoadError::LengthMismatch {
                expected,
                actual: values.len(),
            };
            error!(
                loader = %loader,
                expected,
                actual = values.len(),
                "batch function returned a mismatched result count"
            );
            for cell in &cells {
                cell.resolve(Err(violation.clone()));
            }
            Some(violation)
        }
        Err(err) => {
            warn!(loader = %loader, keys = expected, error = %err, "batch fetch failed");
            let shared = LoadError::Fetch(Arc::new(err));
            for cell in &cells {
                cell.resolve(Err(shared.clone()));
            }
            None
        }
    };

    metrics::histogram!("loadgraph_loader_fetch_duration_seconds", "loader" => loader)
        .record(started.elapsed().as_secs_f64());

    violation
}

impl<K, V, F> Drop for Inner<K, V, F>
where
    K: Send + Sync + 'static,
    V: Send + 'static,
    F: BatchFn<K, V>,
{
    fn drop(&mut self) {
        // Callers still holding receivers observe `Cancelled`.
        let state = self.state.get_mut();
        for cell in state.open.cells.drain(..) {
            cell.abandon();
        }
    }
}
