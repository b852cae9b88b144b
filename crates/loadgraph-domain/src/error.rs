//! Domain error types for query resolution and mutations.

use thiserror::Error;

/// Domain-specific errors.
///
/// Missing entities are reported through the mutation result variants,
/// never through this type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A storage collaborator call failed (connection, query, transaction).
    #[error("storage operation failed: {reason}")]
    StorageOperationFailed { reason: String },

    /// Input rejected before reaching storage.
    #[error("invalid input for '{field}': {message}")]
    InvalidInput { field: String, message: String },

    /// An insert collided with an existing primary key.
    #[error("{entity} with id {id} already exists")]
    DuplicateEntity { entity: &'static str, id: i64 },

    /// A batch function broke the loader contract. Fatal for the pass.
    #[error("loader contract violation in '{loader}': {message}")]
    LoaderContractViolation { loader: String, message: String },

    /// A loader was cancelled or dropped while a caller was waiting.
    #[error("loader '{loader}' unavailable: {message}")]
    LoaderUnavailable { loader: String, message: String },
}

impl DomainError {
    /// Wraps any displayable storage failure.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        DomainError::StorageOperationFailed {
            reason: err.to_string(),
        }
    }

    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        DomainError::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
