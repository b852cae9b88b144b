//! Adapters that bridge the storage layer to the domain layer.
//!
//! The domain layer (loadgraph-domain) defines abstract traits for data access:
//! - `UserReader` / `PostReader`: reads used by resolution passes
//! - `EntityWriter`: transactional writes used by mutations
//!
//! The storage layer (loadgraph-storage) implements `DataStore` with concrete
//! backends. [`DataStoreAdapter`] implements all three domain traits on top
//! of any `DataStore`, converting rows to domain entities on the way.

use std::sync::Arc;

use async_trait::async_trait;

use loadgraph_domain::error::{DomainError, DomainResult};
use loadgraph_domain::model::{
    NewPost, NewUser, Post, PostId, PostPatch, User, UserId, UserPatch,
};
use loadgraph_domain::mutation::{EntityWriter, WriteOutcome};
use loadgraph_domain::resolver::{PostReader, UserReader};
use loadgraph_storage::{
    self as storage, DataStore, NewPostRow, NewUserRow, PostChanges, PostRow, StorageError,
    UserChanges, UserRow,
};

/// Adapter that implements the domain read and write traits using a `DataStore`.
pub struct DataStoreAdapter<S: DataStore> {
    storage: Arc<S>,
}

impl<S: DataStore> DataStoreAdapter<S> {
    /// Creates a new adapter wrapping the given storage.
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl<S: DataStore> UserReader for DataStoreAdapter<S> {
    async fn list_users(&self) -> DomainResult<Vec<User>> {
        let rows = self.storage.list_users().await.map_err(storage_error)?;
        Ok(rows.into_iter().map(user_from_row).collect())
    }

    async fn find_user(&self, id: UserId) -> DomainResult<Option<User>> {
        let row = self.storage.get_user(id).await.map_err(storage_error)?;
        Ok(row.map(user_from_row))
    }

    async fn find_users_by_ids(&self, ids: &[UserId]) -> DomainResult<Vec<User>> {
        let rows = self
            .storage
            .get_users_by_ids(ids)
            .await
            .map_err(storage_error)?;
        Ok(rows.into_iter().map(user_from_row).collect())
    }
}

#[async_trait]
impl<S: DataStore> PostReader for DataStoreAdapter<S> {
    async fn list_posts(&self) -> DomainResult<Vec<Post>> {
        let rows = self.storage.list_posts().await.map_err(storage_error)?;
        Ok(rows.into_iter().map(post_from_row).collect())
    }

    async fn find_post(&self, id: PostId) -> DomainResult<Option<Post>> {
        let row = self.storage.get_post(id).await.map_err(storage_error)?;
        Ok(row.map(post_from_row))
    }

    async fn find_posts_by_user_ids(&self, user_ids: &[UserId]) -> DomainResult<Vec<Post>> {
        let rows = self
            .storage
            .find_posts_by_user_ids(user_ids)
            .await
            .map_err(storage_error)?;
        Ok(rows.into_iter().map(post_from_row).collect())
    }
}

#[async_trait]
impl<S: DataStore> EntityWriter for DataStoreAdapter<S> {
    async fn create_user(&self, input: NewUser) -> DomainResult<User> {
        let row = self
            .storage
            .create_user(NewUserRow {
                id: input.id,
                name: input.name,
                age: input.age,
            })
            .await
            .map_err(storage_error)?;
        Ok(user_from_row(row))
    }

    async fn update_user(&self, id: UserId, patch: UserPatch) -> DomainResult<WriteOutcome<User>> {
        let changes = UserChanges {
            name: patch.name,
            age: patch.age,
        };
        let outcome = self
            .storage
            .update_user(id, changes)
            .await
            .map_err(storage_error)?;
        Ok(outcome_from_storage(outcome, user_from_row))
    }

    async fn delete_user(&self, id: UserId) -> DomainResult<WriteOutcome<UserId>> {
        let outcome = self.storage.delete_user(id).await.map_err(storage_error)?;
        Ok(outcome_from_storage(outcome, |id| id))
    }

    async fn create_post(&self, input: NewPost) -> DomainResult<WriteOutcome<Post>> {
        let outcome = self
            .storage
            .create_post(NewPostRow {
                content: input.content,
                user_id: input.user_id,
            })
            .await
            .map_err(storage_error)?;
        Ok(outcome_from_storage(outcome, post_from_row))
    }

    async fn update_post(&self, id: PostId, patch: PostPatch) -> DomainResult<WriteOutcome<Post>> {
        let changes = PostChanges {
            content: patch.content,
            user_id: patch.user_id,
        };
        let outcome = self
            .storage
            .update_post(id, changes)
            .await
            .map_err(storage_error)?;
        Ok(outcome_from_storage(outcome, post_from_row))
    }

    async fn delete_post(&self, id: PostId) -> DomainResult<WriteOutcome<PostId>> {
        let outcome = self.storage.delete_post(id).await.map_err(storage_error)?;
        Ok(outcome_from_storage(outcome, |id| id))
    }
}

fn user_from_row(row: UserRow) -> User {
    User::new(row.id, row.name, row.age)
}

fn post_from_row(row: PostRow) -> Post {
    Post::new(row.id, row.content, row.user_id)
}

fn outcome_from_storage<T, U>(
    outcome: storage::WriteOutcome<T>,
    convert: impl FnOnce(T) -> U,
) -> WriteOutcome<U> {
    match outcome {
        storage::WriteOutcome::Applied(value) => WriteOutcome::Applied(convert(value)),
        storage::WriteOutcome::MissingUser(id) => WriteOutcome::MissingUser(id),
        storage::WriteOutcome::MissingPost(id) => WriteOutcome::MissingPost(id),
    }
}

/// Key collisions keep their meaning; everything else is an opaque storage failure.
fn storage_error(err: StorageError) -> DomainError {
    match err {
        StorageError::DuplicateRow { table, id } => DomainError::DuplicateEntity {
            entity: entity_name(table),
            id,
        },
        other => DomainError::storage(other),
    }
}

fn entity_name(table: &'static str) -> &'static str {
    match table {
        "users" => "user",
        "posts" => "post",
        other => other,
    }
}
