//! Traits for storage reads needed by resolution passes.

use async_trait::async_trait;

use crate::error::DomainResult;
use crate::model::{Post, PostId, User, UserId};

/// Trait for user reads.
#[async_trait]
pub trait UserReader: Send + Sync {
    /// Lists every user ordered by id.
    async fn list_users(&self) -> DomainResult<Vec<User>>;

    async fn find_user(&self, id: UserId) -> DomainResult<Option<User>>;

    /// Fetches the users whose id is in `ids`, in no particular order.
    /// Unknown ids are skipped.
    async fn find_users_by_ids(&self, ids: &[UserId]) -> DomainResult<Vec<User>>;
}

/// Trait for post reads.
#[async_trait]
pub trait PostReader: Send + Sync {
    /// Lists every post ordered by id.
    async fn list_posts(&self) -> DomainResult<Vec<Post>>;

    async fn find_post(&self, id: PostId) -> DomainResult<Option<Post>>;

    /// Fetches every post owned by any of `user_ids`, in no particular order.
    ///
    /// This is the bulk query behind the posts loader: one call per batch,
    /// however many users the batch covers.
    async fn find_posts_by_user_ids(&self, user_ids: &[UserId]) -> DomainResult<Vec<Post>>;
}
