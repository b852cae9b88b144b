//! Mutation service: runs writes and maps their outcome onto result variants.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::DomainResult;
use crate::model::{Deleted, NewPost, NewUser, Post, PostId, PostPatch, User, UserId, UserPatch};

use super::traits::{EntityWriter, WriteOutcome};
use super::variant::{NotFoundError, PostMutation, UserMutation};

/// Executes mutations against an [`EntityWriter`].
///
/// `field` in a not-found variant names the input that carried the bad id:
/// `"id"` for the mutation target, `"userId"` for a post's author.
pub struct MutationService<W> {
    writer: Arc<W>,
}

impl<W> Clone for MutationService<W> {
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
        }
    }
}

impl<W: EntityWriter> MutationService<W> {
    pub fn new(writer: Arc<W>) -> Self {
        Self { writer }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_user(&self, input: NewUser) -> DomainResult<UserMutation<User>> {
        let user = self.writer.create_user(input).await?;
        debug!(user_id = user.id, "user created");
        Ok(UserMutation::Success(user))
    }

    #[instrument(skip(self, patch))]
    pub async fn update_user(
        &self,
        id: UserId,
        patch: UserPatch,
    ) -> DomainResult<UserMutation<User>> {
        let outcome = self.writer.update_user(id, patch).await?;
        Ok(user_variant(outcome, |user| user))
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: UserId) -> DomainResult<UserMutation<Deleted>> {
        let outcome = self.writer.delete_user(id).await?;
        Ok(user_variant(outcome, |id| Deleted { id }))
    }

    #[instrument(skip(self, input), fields(user_id = input.user_id))]
    pub async fn create_post(&self, input: NewPost) -> DomainResult<PostMutation<Post>> {
        let outcome = self.writer.create_post(input).await?;
        Ok(post_variant(outcome, |post| post))
    }

    #[instrument(skip(self, patch))]
    pub async fn update_post(
        &self,
        id: PostId,
        patch: PostPatch,
    ) -> DomainResult<PostMutation<Post>> {
        let outcome = self.writer.update_post(id, patch).await?;
        Ok(post_variant(outcome, |post| post))
    }

    #[instrument(skip(self))]
    pub async fn delete_post(&self, id: PostId) -> DomainResult<PostMutation<Deleted>> {
        let outcome = self.writer.delete_post(id).await?;
        Ok(post_variant(outcome, |id| Deleted { id }))
    }
}

fn user_variant<T, U>(outcome: WriteOutcome<T>, success: impl FnOnce(T) -> U) -> UserMutation<U> {
    match outcome {
        WriteOutcome::Applied(value) => UserMutation::Success(success(value)),
        // A user mutation only ever targets the user itself.
        WriteOutcome::MissingUser(id) | WriteOutcome::MissingPost(id) => {
            debug!(requested_id = id, "user mutation target missing");
            UserMutation::UserNotFoundError(NotFoundError::user("id", id))
        }
    }
}

fn post_variant<T, U>(outcome: WriteOutcome<T>, success: impl FnOnce(T) -> U) -> PostMutation<U> {
    match outcome {
        WriteOutcome::Applied(value) => PostMutation::Success(success(value)),
        WriteOutcome::MissingPost(id) => {
            debug!(requested_id = id, "post mutation target missing");
            PostMutation::PostNotFoundError(NotFoundError::post("id", id))
        }
        WriteOutcome::MissingUser(id) => {
            debug!(requested_id = id, "post author missing");
            PostMutation::UserNotFoundError(NotFoundError::user("userId", id))
        }
    }
}
