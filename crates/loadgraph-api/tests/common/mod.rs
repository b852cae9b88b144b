//! Shared test utilities for loadgraph API tests.

// Each test file uses a different subset of these helpers.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use tower::ServiceExt;

use loadgraph_api::http::{create_router, AppState};
use loadgraph_storage::{
    seed, DataStore, Dataset, HealthStatus, MemoryDataStore, NewPostRow, NewUserRow, PostChanges,
    PostRow, StorageError, StorageResult, UserChanges, UserRow, WriteOutcome,
};

// =============================================================================
// Instrumented Store
// =============================================================================

/// In-memory store that counts bulk reads and can be told to fail.
#[derive(Default)]
pub struct InstrumentedStore {
    inner: MemoryDataStore,
    post_batches: AtomicUsize,
    user_batches: AtomicUsize,
    fail_post_batches: AtomicBool,
    fail_writes: AtomicBool,
}

impl InstrumentedStore {
    pub async fn seeded() -> Arc<Self> {
        let store = Arc::new(Self::default());
        seed(store.as_ref()).await.unwrap();
        store
    }

    /// Calls to `find_posts_by_user_ids`.
    pub fn post_batches(&self) -> usize {
        self.post_batches.load(Ordering::SeqCst)
    }

    /// Calls to `get_users_by_ids`.
    pub fn user_batches(&self) -> usize {
        self.user_batches.load(Ordering::SeqCst)
    }

    pub fn fail_post_batches(&self) {
        self.fail_post_batches.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    fn check_writes(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::ConnectionError {
                message: "connection reset by peer".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DataStore for InstrumentedStore {
    fn backend(&self) -> &'static str {
        "instrumented"
    }

    async fn list_users(&self) -> StorageResult<Vec<UserRow>> {
        self.inner.list_users().await
    }

    async fn get_user(&self, id: i64) -> StorageResult<Option<UserRow>> {
        self.inner.get_user(id).await
    }

    async fn get_users_by_ids(&self, ids: &[i64]) -> StorageResult<Vec<UserRow>> {
        self.user_batches.fetch_add(1, Ordering::SeqCst);
        self.inner.get_users_by_ids(ids).await
    }

    async fn list_posts(&self) -> StorageResult<Vec<PostRow>> {
        self.inner.list_posts().await
    }

    async fn get_post(&self, id: i64) -> StorageResult<Option<PostRow>> {
        self.inner.get_post(id).await
    }

    async fn find_posts_by_user_ids(&self, user_ids: &[i64]) -> StorageResult<Vec<PostRow>> {
        self.post_batches.fetch_add(1, Ordering::SeqCst);
        if self.fail_post_batches.load(Ordering::SeqCst) {
            return Err(StorageError::QueryError {
                message: "posts table unavailable".to_string(),
            });
        }
        self.inner.find_posts_by_user_ids(user_ids).await
    }

    async fn create_user(&self, user: NewUserRow) -> StorageResult<UserRow> {
        self.check_writes()?;
        self.inner.create_user(user).await
    }

    async fn update_user(
        &self,
        id: i64,
        changes: UserChanges,
    ) -> StorageResult<WriteOutcome<UserRow>> {
        self.check_writes()?;
        self.inner.update_user(id, changes).await
    }

    async fn delete_user(&self, id: i64) -> StorageResult<WriteOutcome<i64>> {
        self.check_writes()?;
        self.inner.delete_user(id).await
    }

    async fn create_post(&self, post: NewPostRow) -> StorageResult<WriteOutcome<PostRow>> {
        self.check_writes()?;
        self.inner.create_post(post).await
    }

    async fn update_post(
        &self,
        id: i64,
        changes: PostChanges,
    ) -> StorageResult<WriteOutcome<PostRow>> {
        self.check_writes()?;
        self.inner.update_post(id, changes).await
    }

    async fn delete_post(&self, id: i64) -> StorageResult<WriteOutcome<i64>> {
        self.check_writes()?;
        self.inner.delete_post(id).await
    }

    async fn replace_all(&self, dataset: Dataset) -> StorageResult<()> {
        self.inner.replace_all(dataset).await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        self.inner.health_check().await
    }
}

// =============================================================================
// Request Helpers
// =============================================================================

/// Creates a router over `storage` without observability middleware.
///
/// Each call wraps the shared storage in a fresh `AppState`, which is the
/// pattern `oneshot` testing needs.
pub fn create_test_app<S: DataStore>(storage: &Arc<S>) -> axum::Router {
    create_router(AppState::new(Arc::clone(storage)))
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Sends `request` and returns the status with the parsed JSON body.
pub async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}
