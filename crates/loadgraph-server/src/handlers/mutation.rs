//! Mutation handler: input validation in front of the domain service.

use std::sync::Arc;

use loadgraph_domain::error::DomainError;
use loadgraph_domain::model::{
    Deleted, NewPost, NewUser, Post, PostId, PostPatch, User, UserId, UserPatch,
};
use loadgraph_domain::mutation::{EntityWriter, MutationService, PostMutation, UserMutation};

/// Upper bound accepted for a user's age.
pub const MAX_AGE: i32 = 150;

/// Errors that can occur while handling a mutation.
///
/// Missing entities are not errors; they come back as result variants.
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    /// The input failed validation. Nothing reached storage.
    #[error("invalid input for '{field}': {message}")]
    InvalidInput { field: String, message: String },

    /// The domain layer failed.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl MutationError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        MutationError::InvalidInput {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for mutation handling.
pub type MutationResult<T> = Result<T, MutationError>;

/// Handler for user and post mutations.
///
/// Names and contents are trimmed before they are stored.
pub struct MutationHandler<W> {
    service: MutationService<W>,
}

impl<W> Clone for MutationHandler<W> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

impl<W: EntityWriter> MutationHandler<W> {
    pub fn new(writer: Arc<W>) -> Self {
        Self {
            service: MutationService::new(writer),
        }
    }

    pub async fn create_user(&self, mut input: NewUser) -> MutationResult<UserMutation<User>> {
        if let Some(id) = input.id {
            validate_id("id", id)?;
        }
        input.name = validate_text("name", &input.name)?;
        validate_age(input.age)?;

        Ok(self.service.create_user(input).await?)
    }

    pub async fn update_user(
        &self,
        id: UserId,
        mut patch: UserPatch,
    ) -> MutationResult<UserMutation<User>> {
        validate_id("id", id)?;
        if patch.is_empty() {
            return Err(MutationError::invalid(
                "input",
                "at least one of name, age is required",
            ));
        }
        patch.name = patch
            .name
            .as_deref()
            .map(|name| validate_text("name", name))
            .transpose()?;
        if let Some(age) = patch.age {
            validate_age(age)?;
        }

        Ok(self.service.update_user(id, patch).await?)
    }

    pub async fn delete_user(&self, id: UserId) -> MutationResult<UserMutation<Deleted>> {
        validate_id("id", id)?;
        Ok(self.service.delete_user(id).await?)
    }

    pub async fn create_post(&self, mut input: NewPost) -> MutationResult<PostMutation<Post>> {
        input.content = validate_text("content", &input.content)?;
        validate_id("userId", input.user_id)?;

        Ok(self.service.create_post(input).await?)
    }

    pub async fn update_post(
        &self,
        id: PostId,
        mut patch: PostPatch,
    ) -> MutationResult<PostMutation<Post>> {
        validate_id("id", id)?;
        if patch.is_empty() {
            return Err(MutationError::invalid(
                "input",
                "at least one of content, userId is required",
            ));
        }
        patch.content = patch
            .content
            .as_deref()
            .map(|content| validate_text("content", content))
            .transpose()?;
        if let Some(user_id) = patch.user_id {
            validate_id("userId", user_id)?;
        }

        Ok(self.service.update_post(id, patch).await?)
    }

    pub async fn delete_post(&self, id: PostId) -> MutationResult<PostMutation<Deleted>> {
        validate_id("id", id)?;
        Ok(self.service.delete_post(id).await?)
    }
}

fn validate_id(field: &str, id: i64) -> MutationResult<()> {
    if id <= 0 {
        return Err(MutationError::invalid(
            field,
            format!("must be a positive integer, got {id}"),
        ));
    }
    Ok(())
}

/// Returns the trimmed text, or an error when nothing is left.
fn validate_text(field: &str, value: &str) -> MutationResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(MutationError::invalid(field, "cannot be empty"));
    }
    Ok(trimmed.to_string())
}

fn validate_age(age: i32) -> MutationResult<()> {
    if !(0..=MAX_AGE).contains(&age) {
        return Err(MutationError::invalid(
            "age",
            format!("must be between 0 and {MAX_AGE}, got {age}"),
        ));
    }
    Ok(())
}
