//! Query resolution over users and posts.
//!
//! A [`ResolutionPass`] is created per request and resolves the fixed field
//! tree of the read API:
//!
//! ```text
//! users            -> [User { posts: [Post] }]
//! user(id)         -> User { posts: [Post] }
//! posts            -> [Post { author: User }]
//! post(id)         -> Post { author: User }
//! postsForUsers    -> [{ userId, posts: [Post] }]
//! overview         -> { users, posts }
//! hello            -> String
//! ```
//!
//! Relation fields only go through the pass's loaders.

mod batch;
mod config;
mod pass;
mod traits;
mod types;

pub use batch::{PostsByUser, UsersById};
pub use config::PassConfig;
pub use pass::{ResolutionPass, HELLO};
pub use traits::{PostReader, UserReader};
pub use types::{
    FieldError, Overview, PassStats, PathSegment, PostNode, Resolved, UserNode, UserPosts,
};

#[cfg(test)]
mod tests;
