//! Mock implementations for resolver testing.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{DomainError, DomainResult};
use crate::model::{Post, PostId, User, UserId};
use crate::resolver::{PostReader, UserReader};

/// Mock store recording every bulk query it serves.
///
/// Bulk queries return rows in reverse storage order so that callers cannot
/// rely on row order.
pub struct MockStore {
    users: Vec<User>,
    posts: Vec<Post>,
    post_batches: Mutex<Vec<Vec<UserId>>>,
    user_batches: Mutex<Vec<Vec<UserId>>>,
    list_calls: AtomicUsize,
    fail_post_batches: AtomicBool,
}

impl MockStore {
    pub fn new(users: Vec<User>, posts: Vec<Post>) -> Self {
        Self {
            users,
            posts,
            post_batches: Mutex::new(Vec::new()),
            user_batches: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
            fail_post_batches: AtomicBool::new(false),
        }
    }

    /// The sample data the server seeds at startup.
    pub fn seeded() -> Self {
        Self::new(
            vec![User::new(1, "John Doe", 25), User::new(2, "Jane Doe", 30)],
            vec![
                Post::new(1, "Post-1", 1),
                Post::new(2, "Post-2", 1),
                Post::new(3, "Post-3", 2),
            ],
        )
    }

    /// Many users, each owning one post with the same id.
    pub fn wide(count: i64) -> Self {
        Self::new(
            (1..=count)
                .map(|id| User::new(id, format!("user-{id}"), 20))
                .collect(),
            (1..=count)
                .map(|id| Post::new(id, format!("post-{id}"), id))
                .collect(),
        )
    }

    pub fn fail_post_batches(&self) {
        self.fail_post_batches.store(true, Ordering::SeqCst);
    }

    pub fn post_batches(&self) -> Vec<Vec<UserId>> {
        self.post_batches.lock().clone()
    }

    pub fn user_batches(&self) -> Vec<Vec<UserId>> {
        self.user_batches.lock().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserReader for MockStore {
    async fn list_users(&self) -> DomainResult<Vec<User>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.users.clone())
    }

    async fn find_user(&self, id: UserId) -> DomainResult<Option<User>> {
        Ok(self.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_users_by_ids(&self, ids: &[UserId]) -> DomainResult<Vec<User>> {
        self.user_batches.lock().push(ids.to_vec());
        Ok(self
            .users
            .iter()
            .rev()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PostReader for MockStore {
    async fn list_posts(&self) -> DomainResult<Vec<Post>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.posts.clone())
    }

    async fn find_post(&self, id: PostId) -> DomainResult<Option<Post>> {
        Ok(self.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn find_posts_by_user_ids(&self, user_ids: &[UserId]) -> DomainResult<Vec<Post>> {
        self.post_batches.lock().push(user_ids.to_vec());
        if self.fail_post_batches.load(Ordering::SeqCst) {
            return Err(DomainError::storage("database is locked"));
        }
        Ok(self
            .posts
            .iter()
            .rev()
            .filter(|p| user_ids.contains(&p.user_id))
            .cloned()
            .collect())
    }
}
