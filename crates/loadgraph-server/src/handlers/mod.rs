//! Request handlers.
//!
//! Handlers are generic over the domain's storage traits so the API layer
//! can plug in any backend, and tests can plug in mocks.

mod mutation;
mod query;

pub use mutation::{MutationError, MutationHandler, MutationResult, MAX_AGE};
pub use query::{QueryHandler, MAX_USER_IDS};

#[cfg(test)]
mod tests;
