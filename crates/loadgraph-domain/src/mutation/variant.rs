//! Tagged result variants returned by mutations.
//!
//! Each entity has a closed union with exactly one `Success` arm. Domain
//! failures are ordinary values that callers must match on; only
//! infrastructure failures travel as `Err`.
//!
//! Serialized form (internally tagged on `kind`):
//!
//! ```text
//! { "kind": "Success", "id": 1, "name": "John Doe", "age": 25 }
//! { "kind": "UserNotFoundError", "code": "USER_NOT_FOUND",
//!   "message": "user 99 not found", "field": "id", "requestedId": 99 }
//! ```

use serde::{Deserialize, Serialize};

/// Stable machine-readable code carried by a not-found variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotFoundCode {
    UserNotFound,
    PostNotFound,
}

impl NotFoundCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotFoundCode::UserNotFound => "USER_NOT_FOUND",
            NotFoundCode::PostNotFound => "POST_NOT_FOUND",
        }
    }
}

impl std::fmt::Display for NotFoundCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a not-found variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundError {
    pub code: NotFoundCode,
    pub message: String,
    /// Name of the input field that referenced the missing entity.
    pub field: String,
    pub requested_id: i64,
}

impl NotFoundError {
    pub fn user(field: impl Into<String>, id: i64) -> Self {
        Self {
            code: NotFoundCode::UserNotFound,
            message: format!("user {id} not found"),
            field: field.into(),
            requested_id: id,
        }
    }

    pub fn post(field: impl Into<String>, id: i64) -> Self {
        Self {
            code: NotFoundCode::PostNotFound,
            message: format!("post {id} not found"),
            field: field.into(),
            requested_id: id,
        }
    }
}

/// Outcome of a user mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum UserMutation<T> {
    Success(T),
    UserNotFoundError(NotFoundError),
}

impl<T> UserMutation<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, UserMutation::Success(_))
    }

    /// The success payload, if any.
    pub fn success(self) -> Option<T> {
        match self {
            UserMutation::Success(value) => Some(value),
            UserMutation::UserNotFoundError(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            UserMutation::Success(_) => "Success",
            UserMutation::UserNotFoundError(_) => "UserNotFoundError",
        }
    }
}

/// Outcome of a post mutation. A post write can fail on the post itself or
/// on the author it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PostMutation<T> {
    Success(T),
    PostNotFoundError(NotFoundError),
    UserNotFoundError(NotFoundError),
}

impl<T> PostMutation<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, PostMutation::Success(_))
    }

    pub fn success(self) -> Option<T> {
        match self {
            PostMutation::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PostMutation::Success(_) => "Success",
            PostMutation::PostNotFoundError(_) => "PostNotFoundError",
            PostMutation::UserNotFoundError(_) => "UserNotFoundError",
        }
    }
}
