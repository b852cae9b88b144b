//! Per-request resolution pass.

use std::hash::Hash;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{instrument, warn};

use crate::error::{DomainError, DomainResult};
use crate::loader::{BatchFn, BatchLoader, LoadError, LoadResult};
use crate::model::{Post, PostId, User, UserId};

use super::batch::{PostsByUser, UsersById};
use super::config::PassConfig;
use super::traits::{PostReader, UserReader};
use super::types::{
    FieldError, Overview, PassStats, PathSegment, PostNode, Resolved, UserNode, UserPosts,
};

const POSTS_LOADER: &str = "posts_by_user";
const AUTHOR_LOADER: &str = "author_by_id";

/// Greeting returned by the `hello` query.
pub const HELLO: &str = "Hello from loadgraph!";

/// One top-level resolution of a client request.
///
/// Owns a fresh loader per relation, so nothing is cached across requests.
/// Each query resolves breadth-first: the root rows are read directly, then
/// every relation load of the next level is issued before a single explicit
/// flush, so a level costs one storage query whatever its width.
///
/// Load failures on a relation field become `null` plus a [`FieldError`].
/// A batch function that breaks its contract fails the whole request.
pub struct ResolutionPass<U, P>
where
    U: UserReader + 'static,
    P: PostReader + 'static,
{
    users: Arc<U>,
    posts: Arc<P>,
    posts_by_user: BatchLoader<UserId, Vec<Post>, PostsByUser<P>>,
    author_by_id: BatchLoader<UserId, Option<User>, UsersById<U>>,
}

impl<U, P> ResolutionPass<U, P>
where
    U: UserReader + 'static,
    P: PostReader + 'static,
{
    pub fn new(users: Arc<U>, posts: Arc<P>, config: &PassConfig) -> Self {
        Self {
            posts_by_user: BatchLoader::with_config(
                PostsByUser::new(Arc::clone(&posts)),
                config.loader(POSTS_LOADER),
            ),
            author_by_id: BatchLoader::with_config(
                UsersById::new(Arc::clone(&users)),
                config.loader(AUTHOR_LOADER),
            ),
            users,
            posts,
        }
    }

    pub fn hello(&self) -> &'static str {
        HELLO
    }

    /// Every user with its posts.
    #[instrument(skip(self))]
    pub async fn users(&self) -> DomainResult<Resolved<Vec<UserNode>>> {
        let users = self.users.list_users().await?;
        let mut errors = Vec::new();
        let nodes = self
            .user_nodes(users, |index| list_path("users", index, "posts"), &mut errors)
            .await?;
        Ok(Resolved::new(nodes, errors))
    }

    /// One user with its posts, or `None` when the id is unknown.
    #[instrument(skip(self))]
    pub async fn user(&self, id: UserId) -> DomainResult<Resolved<Option<UserNode>>> {
        let Some(user) = self.users.find_user(id).await? else {
            return Ok(Resolved::new(None, Vec::new()));
        };
        let mut errors = Vec::new();
        let mut nodes = self
            .user_nodes(
                vec![user],
                |_| vec![PathSegment::Field("user"), PathSegment::Field("posts")],
                &mut errors,
            )
            .await?;
        Ok(Resolved::new(nodes.pop(), errors))
    }

    /// Every post with its author.
    #[instrument(skip(self))]
    pub async fn posts(&self) -> DomainResult<Resolved<Vec<PostNode>>> {
        let posts = self.posts.list_posts().await?;
        let mut errors = Vec::new();
        let nodes = self
            .post_nodes(posts, |index| list_path("posts", index, "author"), &mut errors)
            .await?;
        Ok(Resolved::new(nodes, errors))
    }

    #[instrument(skip(self))]
    pub async fn post(&self, id: PostId) -> DomainResult<Resolved<Option<PostNode>>> {
        let Some(post) = self.posts.find_post(id).await? else {
            return Ok(Resolved::new(None, Vec::new()));
        };
        let mut errors = Vec::new();
        let mut nodes = self
            .post_nodes(
                vec![post],
                |_| vec![PathSegment::Field("post"), PathSegment::Field("author")],
                &mut errors,
            )
            .await?;
        Ok(Resolved::new(nodes.pop(), errors))
    }

    /// Posts grouped per requested user id, in request order. Repeated and
    /// unknown ids are allowed; unknown ids get an empty list.
    #[instrument(skip(self, user_ids), fields(count = user_ids.len()))]
    pub async fn posts_for_users(
        &self,
        user_ids: Vec<UserId>,
    ) -> DomainResult<Resolved<Vec<UserPosts>>> {
        let pending = self.posts_by_user.load_many(user_ids.iter().copied());
        flush(&self.posts_by_user).await?;
        let results = pending.await;

        let mut errors = Vec::new();
        let mut groups = Vec::with_capacity(user_ids.len());
        for (index, (user_id, result)) in user_ids.into_iter().zip(results).enumerate() {
            let path = || {
                vec![
                    PathSegment::Field("postsForUsers"),
                    PathSegment::Index(index),
                ]
            };
            let posts = field_value(result, POSTS_LOADER, path, &mut errors)?;
            groups.push(UserPosts { user_id, posts });
        }
        Ok(Resolved::new(groups, errors))
    }

    /// Users with posts and posts with authors in one pass.
    ///
    /// The user list read at the root primes the author loader, so authors
    /// resolve from cache instead of a second user query.
    #[instrument(skip(self))]
    pub async fn overview(&self) -> DomainResult<Resolved<Overview>> {
        let (users, posts) = tokio::try_join!(self.users.list_users(), self.posts.list_posts())?;
        for user in &users {
            self.author_by_id.prime(user.id, Some(user.clone()));
        }

        let mut errors = Vec::new();
        let users = self
            .user_nodes(users, |index| list_path("users", index, "posts"), &mut errors)
            .await?;
        let posts = self
            .post_nodes(posts, |index| list_path("posts", index, "author"), &mut errors)
            .await?;
        Ok(Resolved::new(Overview { users, posts }, errors))
    }

    pub fn stats(&self) -> PassStats {
        PassStats {
            posts: self.posts_by_user.stats(),
            authors: self.author_by_id.stats(),
        }
    }

    async fn user_nodes(
        &self,
        users: Vec<User>,
        path_of: impl Fn(usize) -> Vec<PathSegment> + Send,
        errors: &mut Vec<FieldError>,
    ) -> DomainResult<Vec<UserNode>> {
        let pending: Vec<_> = users
            .iter()
            .map(|user| self.posts_by_user.load(user.id))
            .collect();
        flush(&self.posts_by_user).await?;
        let results = join_all(pending).await;

        let mut nodes = Vec::with_capacity(users.len());
        for (index, (user, result)) in users.into_iter().zip(results).enumerate() {
            let posts = field_value(result, POSTS_LOADER, || path_of(index), errors)?;
            nodes.push(UserNode { user, posts });
        }
        Ok(nodes)
    }

    async fn post_nodes(
        &self,
        posts: Vec<Post>,
        path_of: impl Fn(usize) -> Vec<PathSegment> + Send,
        errors: &mut Vec<FieldError>,
    ) -> DomainResult<Vec<PostNode>> {
        let pending: Vec<_> = posts
            .iter()
            .map(|post| self.author_by_id.load(post.user_id))
            .collect();
        flush(&self.author_by_id).await?;
        let results = join_all(pending).await;

        let mut nodes = Vec::with_capacity(posts.len());
        for (index, (post, result)) in posts.into_iter().zip(results).enumerate() {
            let author = field_value(result, AUTHOR_LOADER, || path_of(index), errors)?.flatten();
            nodes.push(PostNode { post, author });
        }
        Ok(nodes)
    }
}

fn list_path(root: &'static str, index: usize, field: &'static str) -> Vec<PathSegment> {
    vec![
        PathSegment::Field(root),
        PathSegment::Index(index),
        PathSegment::Field(field),
    ]
}

async fn flush<K, V, F>(loader: &BatchLoader<K, V, F>) -> DomainResult<usize>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: BatchFn<K, V, Error = DomainError>,
{
    loader
        .flush()
        .await
        .map_err(|err| fatal_load_error(loader.name(), &err))
}

/// Converts a load result into a nullable field value, recording recoverable
/// failures and propagating fatal ones.
fn field_value<T>(
    result: LoadResult<T, DomainError>,
    loader: &str,
    path: impl FnOnce() -> Vec<PathSegment>,
    errors: &mut Vec<FieldError>,
) -> DomainResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_contract_violation() || err.is_cancelled() => {
            Err(fatal_load_error(loader, &err))
        }
        Err(err) => {
            let path = path();
            warn!(loader, ?path, error = %err, "field resolved to null");
            errors.push(FieldError::new(path, err.to_string()));
            Ok(None)
        }
    }
}

pub(crate) fn fatal_load_error(loader: &str, err: &LoadError<DomainError>) -> DomainError {
    if err.is_cancelled() {
        DomainError::LoaderUnavailable {
            loader: loader.to_string(),
            message: err.to_string(),
        }
    } else {
        DomainError::LoaderContractViolation {
            loader: loader.to_string(),
            message: err.to_string(),
        }
    }
}
