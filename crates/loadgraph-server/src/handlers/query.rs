//! Read query handler.

use std::sync::Arc;

use loadgraph_domain::error::{DomainError, DomainResult};
use loadgraph_domain::model::{PostId, UserId};
use loadgraph_domain::resolver::{
    Overview, PassConfig, PostNode, PostReader, Resolved, ResolutionPass, UserNode, UserPosts,
    UserReader, HELLO,
};
use tracing::debug;

/// Maximum number of user ids accepted by a `posts_for_users` request.
pub const MAX_USER_IDS: usize = 100;

/// Handler for read queries.
///
/// Every call opens its own [`ResolutionPass`], so loader caches live exactly
/// as long as one request.
pub struct QueryHandler<U, P>
where
    U: UserReader + 'static,
    P: PostReader + 'static,
{
    users: Arc<U>,
    posts: Arc<P>,
    config: PassConfig,
}

impl<U, P> Clone for QueryHandler<U, P>
where
    U: UserReader + 'static,
    P: PostReader + 'static,
{
    fn clone(&self) -> Self {
        Self {
            users: Arc::clone(&self.users),
            posts: Arc::clone(&self.posts),
            config: self.config.clone(),
        }
    }
}

impl<U, P> QueryHandler<U, P>
where
    U: UserReader + 'static,
    P: PostReader + 'static,
{
    pub fn new(users: Arc<U>, posts: Arc<P>, config: PassConfig) -> Self {
        Self {
            users,
            posts,
            config,
        }
    }

    /// Opens a new pass with empty loader caches.
    pub fn pass(&self) -> ResolutionPass<U, P> {
        ResolutionPass::new(Arc::clone(&self.users), Arc::clone(&self.posts), &self.config)
    }

    pub fn hello(&self) -> &'static str {
        HELLO
    }

    pub async fn users(&self) -> DomainResult<Resolved<Vec<UserNode>>> {
        let pass = self.pass();
        let result = pass.users().await;
        log_stats("users", &pass);
        result
    }

    pub async fn user(&self, id: UserId) -> DomainResult<Resolved<Option<UserNode>>> {
        let pass = self.pass();
        let result = pass.user(id).await;
        log_stats("user", &pass);
        result
    }

    pub async fn posts(&self) -> DomainResult<Resolved<Vec<PostNode>>> {
        let pass = self.pass();
        let result = pass.posts().await;
        log_stats("posts", &pass);
        result
    }

    pub async fn post(&self, id: PostId) -> DomainResult<Resolved<Option<PostNode>>> {
        let pass = self.pass();
        let result = pass.post(id).await;
        log_stats("post", &pass);
        result
    }

    /// Posts grouped per requested user id, in request order.
    ///
    /// Rejects empty or oversized id lists and non-positive ids.
    pub async fn posts_for_users(
        &self,
        user_ids: Vec<UserId>,
    ) -> DomainResult<Resolved<Vec<UserPosts>>> {
        validate_user_ids(&user_ids)?;

        let pass = self.pass();
        let result = pass.posts_for_users(user_ids).await;
        log_stats("posts_for_users", &pass);
        result
    }

    pub async fn overview(&self) -> DomainResult<Resolved<Overview>> {
        let pass = self.pass();
        let result = pass.overview().await;
        log_stats("overview", &pass);
        result
    }
}

fn validate_user_ids(user_ids: &[UserId]) -> DomainResult<()> {
    if user_ids.is_empty() {
        return Err(DomainError::invalid_input(
            "userIds",
            "at least one user id is required",
        ));
    }

    if user_ids.len() > MAX_USER_IDS {
        return Err(DomainError::invalid_input(
            "userIds",
            format!(
                "{} ids exceeds maximum allowed {MAX_USER_IDS}",
                user_ids.len()
            ),
        ));
    }

    if let Some(bad) = user_ids.iter().find(|id| **id <= 0) {
        return Err(DomainError::invalid_input(
            "userIds",
            format!("user id must be positive, got {bad}"),
        ));
    }

    Ok(())
}

fn log_stats<U, P>(query: &'static str, pass: &ResolutionPass<U, P>)
where
    U: UserReader + 'static,
    P: PostReader + 'static,
{
    let stats = pass.stats();
    debug!(
        query,
        post_batches = stats.posts.batches,
        post_keys = stats.posts.keys_dispatched,
        author_batches = stats.authors.batches,
        author_cache_hits = stats.authors.cache_hits,
        "resolution pass finished"
    );
}
