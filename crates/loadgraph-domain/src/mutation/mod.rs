//! Mutations and their result-variant protocol.
//!
//! A mutation first checks the ids it references, then writes, both inside
//! one atomic unit owned by the [`EntityWriter`]. Missing references come
//! back as a not-found variant with no side effect. Storage faults are
//! `Err(DomainError)`.

mod service;
mod traits;
mod variant;

pub use service::MutationService;
pub use traits::{EntityWriter, WriteOutcome};
pub use variant::{NotFoundCode, NotFoundError, PostMutation, UserMutation};
