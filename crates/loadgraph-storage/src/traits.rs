//! DataStore trait definition.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};

/// A stored user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub age: i32,
}

/// A stored post. `user_id` references `users.id` with cascading delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRow {
    pub id: i64,
    pub content: String,
    pub user_id: i64,
}

/// User to insert. The id is generated when `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUserRow {
    pub id: Option<i64>,
    pub name: String,
    pub age: i32,
}

/// Post to insert. The id is always generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPostRow {
    pub content: String,
    pub user_id: i64,
}

/// Columns to change on a user; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub name: Option<String>,
    pub age: Option<i32>,
}

/// Columns to change on a post; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostChanges {
    pub content: Option<String>,
    pub user_id: Option<i64>,
}

/// Outcome of a write whose reference check ran in the same transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome<T> {
    Applied(T),
    /// The referenced user does not exist; nothing was written.
    MissingUser(i64),
    /// The target post does not exist; nothing was written.
    MissingPost(i64),
}

/// Complete table contents, used to reset a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    pub users: Vec<UserRow>,
    pub posts: Vec<PostRow>,
}

impl Dataset {
    /// Rejects posts whose author is not part of the dataset.
    pub fn validate(&self) -> StorageResult<()> {
        for post in &self.posts {
            if !self.users.iter().any(|user| user.id == post.user_id) {
                return Err(StorageError::InvalidInput {
                    message: format!(
                        "post {} references unknown user {}",
                        post.id, post.user_id
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Result of a storage health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub healthy: bool,
    pub latency: Duration,
    pub backend: &'static str,
}

/// Abstract storage interface for users and posts.
///
/// Implementations must be thread-safe (Send + Sync) and support
/// async operations. Bulk reads return rows in unspecified order.
#[async_trait]
pub trait DataStore: Send + Sync + 'static {
    /// Short backend name used in logs and metrics.
    fn backend(&self) -> &'static str;

    // User reads

    /// Lists all users ordered by id.
    async fn list_users(&self) -> StorageResult<Vec<UserRow>>;

    async fn get_user(&self, id: i64) -> StorageResult<Option<UserRow>>;

    /// Fetches users whose id is in `ids`. Unknown ids are skipped.
    async fn get_users_by_ids(&self, ids: &[i64]) -> StorageResult<Vec<UserRow>>;

    // Post reads

    /// Lists all posts ordered by id.
    async fn list_posts(&self) -> StorageResult<Vec<PostRow>>;

    async fn get_post(&self, id: i64) -> StorageResult<Option<PostRow>>;

    /// Fetches every post owned by any of `user_ids` with a single query.
    async fn find_posts_by_user_ids(&self, user_ids: &[i64]) -> StorageResult<Vec<PostRow>>;

    // Writes. Each runs its existence checks and its write atomically.

    /// Inserts a user. A taken explicit id fails with `DuplicateRow`.
    async fn create_user(&self, user: NewUserRow) -> StorageResult<UserRow>;

    async fn update_user(
        &self,
        id: i64,
        changes: UserChanges,
    ) -> StorageResult<WriteOutcome<UserRow>>;

    /// Deletes a user and every post it owns.
    async fn delete_user(&self, id: i64) -> StorageResult<WriteOutcome<i64>>;

    async fn create_post(&self, post: NewPostRow) -> StorageResult<WriteOutcome<PostRow>>;

    async fn update_post(
        &self,
        id: i64,
        changes: PostChanges,
    ) -> StorageResult<WriteOutcome<PostRow>>;

    async fn delete_post(&self, id: i64) -> StorageResult<WriteOutcome<i64>>;

    // Maintenance

    /// Replaces all rows with `dataset` in one atomic unit.
    async fn replace_all(&self, dataset: Dataset) -> StorageResult<()>;

    async fn health_check(&self) -> StorageResult<HealthStatus>;
}
