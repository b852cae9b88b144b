//! Batch functions backing the relation fields.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DomainError;
use crate::loader::{group_by_key, pick_by_key, BatchFn};
use crate::model::{Post, User, UserId};

use super::traits::{PostReader, UserReader};

/// `User.posts`: one `IN` query for every user id in the batch.
pub struct PostsByUser<P> {
    reader: Arc<P>,
}

impl<P> PostsByUser<P> {
    pub fn new(reader: Arc<P>) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl<P> BatchFn<UserId, Vec<Post>> for PostsByUser<P>
where
    P: PostReader + 'static,
{
    type Error = DomainError;

    async fn load(
        &self,
        user_ids: &[UserId],
    ) -> Result<Vec<Result<Vec<Post>, DomainError>>, DomainError> {
        let rows = self.reader.find_posts_by_user_ids(user_ids).await?;
        Ok(group_by_key(user_ids, rows, |post| post.user_id)
            .into_iter()
            .map(Ok)
            .collect())
    }
}

/// `Post.author`: resolves author ids to users. Unknown ids yield `None`.
pub struct UsersById<U> {
    reader: Arc<U>,
}

impl<U> UsersById<U> {
    pub fn new(reader: Arc<U>) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl<U> BatchFn<UserId, Option<User>> for UsersById<U>
where
    U: UserReader + 'static,
{
    type Error = DomainError;

    async fn load(
        &self,
        ids: &[UserId],
    ) -> Result<Vec<Result<Option<User>, DomainError>>, DomainError> {
        let rows = self.reader.find_users_by_ids(ids).await?;
        Ok(pick_by_key(ids, rows, |user| user.id)
            .into_iter()
            .map(Ok)
            .collect())
    }
}
