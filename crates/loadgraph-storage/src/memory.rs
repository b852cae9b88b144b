//! In-memory storage implementation.
//!
//! Both tables live behind one `RwLock`, so every write (existence check,
//! mutation and cascade) is applied atomically. Generated ids follow SQLite
//! rowid semantics: one past the largest id in the table.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::instrument;

use crate::error::{StorageError, StorageResult};
use crate::traits::{
    DataStore, Dataset, HealthStatus, NewPostRow, NewUserRow, PostChanges, PostRow, UserChanges,
    UserRow, WriteOutcome,
};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, UserRow>,
    posts: BTreeMap<i64, PostRow>,
}

impl Tables {
    fn next_id<T>(table: &BTreeMap<i64, T>) -> i64 {
        table.keys().next_back().map_or(1, |id| id + 1)
    }
}

/// In-memory implementation of DataStore.
#[derive(Debug, Default)]
pub struct MemoryDataStore {
    tables: RwLock<Tables>,
}

impl MemoryDataStore {
    /// Creates a new, empty in-memory data store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory data store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of users and posts currently stored.
    pub fn row_counts(&self) -> (usize, usize) {
        let tables = self.tables.read();
        (tables.users.len(), tables.posts.len())
    }
}

#[async_trait]
impl DataStore for MemoryDataStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn list_users(&self) -> StorageResult<Vec<UserRow>> {
        Ok(self.tables.read().users.values().cloned().collect())
    }

    async fn get_user(&self, id: i64) -> StorageResult<Option<UserRow>> {
        Ok(self.tables.read().users.get(&id).cloned())
    }

    async fn get_users_by_ids(&self, ids: &[i64]) -> StorageResult<Vec<UserRow>> {
        let wanted: HashSet<i64> = ids.iter().copied().collect();
        let tables = self.tables.read();
        Ok(wanted
            .iter()
            .filter_map(|id| tables.users.get(id).cloned())
            .collect())
    }

    async fn list_posts(&self) -> StorageResult<Vec<PostRow>> {
        Ok(self.tables.read().posts.values().cloned().collect())
    }

    async fn get_post(&self, id: i64) -> StorageResult<Option<PostRow>> {
        Ok(self.tables.read().posts.get(&id).cloned())
    }

    async fn find_posts_by_user_ids(&self, user_ids: &[i64]) -> StorageResult<Vec<PostRow>> {
        let wanted: HashSet<i64> = user_ids.iter().copied().collect();
        Ok(self
            .tables
            .read()
            .posts
            .values()
            .filter(|post| wanted.contains(&post.user_id))
            .cloned()
            .collect())
    }

    #[instrument(skip(self, user), fields(id = ?user.id))]
    async fn create_user(&self, user: NewUserRow) -> StorageResult<UserRow> {
        let mut tables = self.tables.write();
        let id = match user.id {
            Some(id) if tables.users.contains_key(&id) => {
                return Err(StorageError::DuplicateRow { table: "users", id });
            }
            Some(id) => id,
            None => Tables::next_id(&tables.users),
        };
        let row = UserRow {
            id,
            name: user.name,
            age: user.age,
        };
        tables.users.insert(id, row.clone());
        Ok(row)
    }

    #[instrument(skip(self, changes))]
    async fn update_user(
        &self,
        id: i64,
        changes: UserChanges,
    ) -> StorageResult<WriteOutcome<UserRow>> {
        let mut tables = self.tables.write();
        let Some(row) = tables.users.get_mut(&id) else {
            return Ok(WriteOutcome::MissingUser(id));
        };
        if let Some(name) = changes.name {
            row.name = name;
        }
        if let Some(age) = changes.age {
            row.age = age;
        }
        Ok(WriteOutcome::Applied(row.clone()))
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, id: i64) -> StorageResult<WriteOutcome<i64>> {
        let mut tables = self.tables.write();
        if tables.users.remove(&id).is_none() {
            return Ok(WriteOutcome::MissingUser(id));
        }
        tables.posts.retain(|_, post| post.user_id != id);
        Ok(WriteOutcome::Applied(id))
    }

    #[instrument(skip(self, post), fields(user_id = post.user_id))]
    async fn create_post(&self, post: NewPostRow) -> StorageResult<WriteOutcome<PostRow>> {
        let mut tables = self.tables.write();
        if !tables.users.contains_key(&post.user_id) {
            return Ok(WriteOutcome::MissingUser(post.user_id));
        }
        let row = PostRow {
            id: Tables::next_id(&tables.posts),
            content: post.content,
            user_id: post.user_id,
        };
        tables.posts.insert(row.id, row.clone());
        Ok(WriteOutcome::Applied(row))
    }

    #[instrument(skip(self, changes))]
    async fn update_post(
        &self,
        id: i64,
        changes: PostChanges,
    ) -> StorageResult<WriteOutcome<PostRow>> {
        let mut guard = self.tables.write();
        let tables = &mut *guard;
        if !tables.posts.contains_key(&id) {
            return Ok(WriteOutcome::MissingPost(id));
        }
        if let Some(user_id) = changes.user_id {
            if !tables.users.contains_key(&user_id) {
                return Ok(WriteOutcome::MissingUser(user_id));
            }
        }
        let Some(row) = tables.posts.get_mut(&id) else {
            return Ok(WriteOutcome::MissingPost(id));
        };
        if let Some(content) = changes.content {
            row.content = content;
        }
        if let Some(user_id) = changes.user_id {
            row.user_id = user_id;
        }
        Ok(WriteOutcome::Applied(row.clone()))
    }

    #[instrument(skip(self))]
    async fn delete_post(&self, id: i64) -> StorageResult<WriteOutcome<i64>> {
        match self.tables.write().posts.remove(&id) {
            Some(_) => Ok(WriteOutcome::Applied(id)),
            None => Ok(WriteOutcome::MissingPost(id)),
        }
    }

    #[instrument(skip(self, dataset), fields(users = dataset.users.len(), posts = dataset.posts.len()))]
    async fn replace_all(&self, dataset: Dataset) -> StorageResult<()> {
        dataset.validate()?;
        let mut tables = self.tables.write();
        tables.users = dataset.users.into_iter().map(|u| (u.id, u)).collect();
        tables.posts = dataset.posts.into_iter().map(|p| (p.id, p)).collect();
        Ok(())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let start = Instant::now();
        drop(self.tables.read());
        Ok(HealthStatus {
            healthy: true,
            latency: start.elapsed(),
            backend: self.backend(),
        })
    }
}
