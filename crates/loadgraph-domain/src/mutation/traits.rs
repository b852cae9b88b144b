//! Storage operations needed by mutations.

use async_trait::async_trait;

use crate::error::DomainResult;
use crate::model::{NewPost, NewUser, Post, PostId, PostPatch, User, UserId, UserPatch};

/// Result of a write whose references were checked in the same atomic unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome<T> {
    /// The write was applied; carries the resulting entity or id.
    Applied(T),
    /// A referenced user did not exist. Nothing was written.
    MissingUser(UserId),
    /// The target post did not exist. Nothing was written.
    MissingPost(PostId),
}

/// Transactional writes. Every method runs its existence read and its
/// write as one atomic unit.
#[async_trait]
pub trait EntityWriter: Send + Sync {
    /// Inserts a user. A caller-supplied id that is already taken is an
    /// error, not a variant.
    async fn create_user(&self, input: NewUser) -> DomainResult<User>;

    async fn update_user(&self, id: UserId, patch: UserPatch) -> DomainResult<WriteOutcome<User>>;

    /// Deletes a user and, by cascade, every post it owns.
    async fn delete_user(&self, id: UserId) -> DomainResult<WriteOutcome<UserId>>;

    async fn create_post(&self, input: NewPost) -> DomainResult<WriteOutcome<Post>>;

    async fn update_post(&self, id: PostId, patch: PostPatch) -> DomainResult<WriteOutcome<Post>>;

    async fn delete_post(&self, id: PostId) -> DomainResult<WriteOutcome<PostId>>;
}
