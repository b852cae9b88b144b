//! Types produced by resolution passes.

use serde::Serialize;

use crate::loader::LoaderStats;
use crate::model::{Post, User, UserId};

/// One step of the path to a field that failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(&'static str),
    Index(usize),
}

/// A field that resolved to `null` because its load failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub path: Vec<PathSegment>,
    pub message: String,
}

impl FieldError {
    pub fn new(path: Vec<PathSegment>, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }
}

/// Result of one query: data plus the fields that could not be resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolved<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl<T> Resolved<T> {
    pub fn new(data: T, errors: Vec<FieldError>) -> Self {
        Self { data, errors }
    }

    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A user with its `posts` relation. `posts` is `None` when its load failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserNode {
    #[serde(flatten)]
    pub user: User,
    pub posts: Option<Vec<Post>>,
}

/// A post with its `author` relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostNode {
    #[serde(flatten)]
    pub post: Post,
    pub author: Option<User>,
}

/// Posts of one requested user, as returned by a bulk lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPosts {
    pub user_id: UserId,
    pub posts: Option<Vec<Post>>,
}

/// Users and posts resolved in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overview {
    pub users: Vec<UserNode>,
    pub posts: Vec<PostNode>,
}

/// Loader counters of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub posts: LoaderStats,
    pub authors: LoaderStats,
}
