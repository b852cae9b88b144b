//! Entity types shared by resolvers, mutations and the API layer.

mod types;

pub use types::*;
