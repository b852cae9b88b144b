//! Tests for resolution passes.
//!
//! Organized by functionality:
//! - Root queries and relation batching
//! - Partial failures
//! - Priming and pass isolation

mod mocks;
