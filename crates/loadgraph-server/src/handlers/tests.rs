//! Tests for the query and mutation handlers.

use super::*;
use async_trait::async_trait;
use loadgraph_domain::error::{DomainError, DomainResult};
use loadgraph_domain::model::{
    Deleted, NewPost, NewUser, Post, PostId, PostPatch, User, UserId, UserPatch,
};
use loadgraph_domain::mutation::{EntityWriter, NotFoundCode, PostMutation, UserMutation, WriteOutcome};
use loadgraph_domain::resolver::{PassConfig, PostReader, UserReader, HELLO};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================
// Test Mocks
// ============================================================

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    posts: Vec<Post>,
}

/// Store serving both reads and writes, counting bulk queries and writes.
#[derive(Default)]
struct MockStore {
    tables: Mutex<Tables>,
    post_batches: AtomicUsize,
    writes: AtomicUsize,
}

impl MockStore {
    fn seeded() -> Arc<Self> {
        let store = Self::default();
        {
            let mut tables = store.tables.lock();
            tables.users = vec![User::new(1, "John Doe", 25), User::new(2, "Jane Doe", 30)];
            tables.posts = vec![
                Post::new(1, "Post-1", 1),
                Post::new(2, "Post-2", 1),
                Post::new(3, "Post-3", 2),
            ];
        }
        Arc::new(store)
    }

    fn post_batches(&self) -> usize {
        self.post_batches.load(Ordering::SeqCst)
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn has_user(tables: &Tables, id: UserId) -> bool {
        tables.users.iter().any(|u| u.id == id)
    }
}

#[async_trait]
impl UserReader for MockStore {
    async fn list_users(&self) -> DomainResult<Vec<User>> {
        Ok(self.tables.lock().users.clone())
    }

    async fn find_user(&self, id: UserId) -> DomainResult<Option<User>> {
        Ok(self.tables.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_users_by_ids(&self, ids: &[UserId]) -> DomainResult<Vec<User>> {
        let tables = self.tables.lock();
        Ok(tables
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PostReader for MockStore {
    async fn list_posts(&self) -> DomainResult<Vec<Post>> {
        Ok(self.tables.lock().posts.clone())
    }

    async fn find_post(&self, id: PostId) -> DomainResult<Option<Post>> {
        Ok(self.tables.lock().posts.iter().find(|p| p.id == id).cloned())
    }

    async fn find_posts_by_user_ids(&self, user_ids: &[UserId]) -> DomainResult<Vec<Post>> {
        self.post_batches.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.lock();
        Ok(tables
            .posts
            .iter()
            .filter(|p| user_ids.contains(&p.user_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EntityWriter for MockStore {
    async fn create_user(&self, input: NewUser) -> DomainResult<User> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.lock();
        let id = match input.id {
            Some(id) if Self::has_user(&tables, id) => {
                return Err(DomainError::DuplicateEntity { entity: "user", id })
            }
            Some(id) => id,
            None => tables.users.iter().map(|u| u.id).max().unwrap_or(0) + 1,
        };
        let user = User::new(id, input.name, input.age);
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: UserId, patch: UserPatch) -> DomainResult<WriteOutcome<User>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.lock();
        let Some(user) = tables.users.iter_mut().find(|u| u.id == id) else {
            return Ok(WriteOutcome::MissingUser(id));
        };
        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(age) = patch.age {
            user.age = age;
        }
        Ok(WriteOutcome::Applied(user.clone()))
    }

    async fn delete_user(&self, id: UserId) -> DomainResult<WriteOutcome<UserId>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.lock();
        if !Self::has_user(&tables, id) {
            return Ok(WriteOutcome::MissingUser(id));
        }
        tables.users.retain(|u| u.id != id);
        tables.posts.retain(|p| p.user_id != id);
        Ok(WriteOutcome::Applied(id))
    }

    async fn create_post(&self, input: NewPost) -> DomainResult<WriteOutcome<Post>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.lock();
        if !Self::has_user(&tables, input.user_id) {
            return Ok(WriteOutcome::MissingUser(input.user_id));
        }
        let id = tables.posts.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        let post = Post::new(id, input.content, input.user_id);
        tables.posts.push(post.clone());
        Ok(WriteOutcome::Applied(post))
    }

    async fn update_post(&self, id: PostId, patch: PostPatch) -> DomainResult<WriteOutcome<Post>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.lock();
        if let Some(user_id) = patch.user_id {
            if !Self::has_user(&tables, user_id) {
                return Ok(WriteOutcome::MissingUser(user_id));
            }
        }
        let Some(post) = tables.posts.iter_mut().find(|p| p.id == id) else {
            return Ok(WriteOutcome::MissingPost(id));
        };
        if let Some(content) = patch.content {
            post.content = content;
        }
        if let Some(user_id) = patch.user_id {
            post.user_id = user_id;
        }
        Ok(WriteOutcome::Applied(post.clone()))
    }

    async fn delete_post(&self, id: PostId) -> DomainResult<WriteOutcome<PostId>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.lock();
        if !tables.posts.iter().any(|p| p.id == id) {
            return Ok(WriteOutcome::MissingPost(id));
        }
        tables.posts.retain(|p| p.id != id);
        Ok(WriteOutcome::Applied(id))
    }
}

fn query_handler(store: &Arc<MockStore>) -> QueryHandler<MockStore, MockStore> {
    QueryHandler::new(Arc::clone(store), Arc::clone(store), PassConfig::default())
}

fn assert_invalid(err: MutationError, expected_field: &str) {
    match err {
        MutationError::InvalidInput { field, .. } => assert_eq!(field, expected_field),
        other => panic!("expected invalid input on {expected_field}, got {other:?}"),
    }
}

// ============================================================
// Section 1: Query Handler
// ============================================================

#[tokio::test]
async fn test_hello_returns_greeting() {
    let store = MockStore::seeded();
    assert_eq!(query_handler(&store).hello(), HELLO);
}

#[tokio::test]
async fn test_users_resolve_posts_with_one_bulk_query() {
    let store = MockStore::seeded();
    let handler = query_handler(&store);

    let result = handler.users().await.unwrap();

    assert!(result.is_complete());
    assert_eq!(result.data.len(), 2);
    let post_counts: Vec<usize> = result
        .data
        .iter()
        .map(|node| node.posts.as_ref().map_or(0, Vec::len))
        .collect();
    assert_eq!(post_counts, vec![2, 1]);
    assert_eq!(store.post_batches(), 1);
}

#[tokio::test]
async fn test_each_request_gets_a_fresh_pass() {
    let store = MockStore::seeded();
    let handler = query_handler(&store);

    handler.users().await.unwrap();
    handler.users().await.unwrap();

    // No cache survives between requests.
    assert_eq!(store.post_batches(), 2);
}

#[tokio::test]
async fn test_user_and_post_lookups() {
    let store = MockStore::seeded();
    let handler = query_handler(&store);

    let user = handler.user(2).await.unwrap().data.unwrap();
    assert_eq!(user.user.name, "Jane Doe");

    assert!(handler.user(99).await.unwrap().data.is_none());

    let post = handler.post(3).await.unwrap().data.unwrap();
    assert_eq!(post.author.map(|u| u.id), Some(2));
}

#[tokio::test]
async fn test_posts_for_users_keeps_request_order() {
    let store = MockStore::seeded();
    let handler = query_handler(&store);

    let result = handler.posts_for_users(vec![2, 1, 2]).await.unwrap();

    let ids: Vec<UserId> = result.data.iter().map(|g| g.user_id).collect();
    assert_eq!(ids, vec![2, 1, 2]);
    assert_eq!(store.post_batches(), 1);
}

#[tokio::test]
async fn test_posts_for_users_rejects_bad_id_lists() {
    let store = MockStore::seeded();
    let handler = query_handler(&store);

    let empty = handler.posts_for_users(vec![]).await.unwrap_err();
    assert!(matches!(empty, DomainError::InvalidInput { .. }));

    let negative = handler.posts_for_users(vec![1, -4]).await.unwrap_err();
    assert!(negative.to_string().contains("-4"));

    let too_many = handler
        .posts_for_users((1..=(MAX_USER_IDS as i64 + 1)).collect())
        .await
        .unwrap_err();
    assert!(too_many.to_string().contains("exceeds maximum"));

    assert_eq!(store.post_batches(), 0);
}

#[tokio::test]
async fn test_overview_resolves_both_lists() {
    let store = MockStore::seeded();
    let handler = query_handler(&store);

    let overview = handler.overview().await.unwrap().data;

    assert_eq!(overview.users.len(), 2);
    assert_eq!(overview.posts.len(), 3);
    assert!(overview.posts.iter().all(|p| p.author.is_some()));
}

// ============================================================
// Section 2: Mutation Validation
// ============================================================

#[tokio::test]
async fn test_create_user_rejects_blank_name() {
    let store = MockStore::seeded();
    let handler = MutationHandler::new(Arc::clone(&store));

    let err = handler
        .create_user(NewUser {
            id: None,
            name: "   ".to_string(),
            age: 20,
        })
        .await
        .unwrap_err();

    assert_invalid(err, "name");
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn test_create_user_rejects_out_of_range_age() {
    let store = MockStore::seeded();
    let handler = MutationHandler::new(Arc::clone(&store));

    for age in [-1, MAX_AGE + 1] {
        let err = handler
            .create_user(NewUser {
                id: None,
                name: "Ann".to_string(),
                age,
            })
            .await
            .unwrap_err();
        assert_invalid(err, "age");
    }
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn test_create_user_trims_name() {
    let store = MockStore::seeded();
    let handler = MutationHandler::new(Arc::clone(&store));

    let result = handler
        .create_user(NewUser {
            id: None,
            name: "  Ann ".to_string(),
            age: 0,
        })
        .await
        .unwrap();

    assert_eq!(result, UserMutation::Success(User::new(3, "Ann", 0)));
}

#[tokio::test]
async fn test_non_positive_ids_are_rejected() {
    let store = MockStore::seeded();
    let handler = MutationHandler::new(Arc::clone(&store));

    assert_invalid(handler.delete_user(0).await.unwrap_err(), "id");
    assert_invalid(handler.delete_post(-3).await.unwrap_err(), "id");
    assert_invalid(
        handler
            .create_post(NewPost {
                content: "hi".to_string(),
                user_id: 0,
            })
            .await
            .unwrap_err(),
        "userId",
    );
    assert_invalid(
        handler
            .create_user(NewUser {
                id: Some(-1),
                name: "Ann".to_string(),
                age: 3,
            })
            .await
            .unwrap_err(),
        "id",
    );
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn test_empty_patches_are_rejected() {
    let store = MockStore::seeded();
    let handler = MutationHandler::new(Arc::clone(&store));

    assert_invalid(
        handler.update_user(1, UserPatch::default()).await.unwrap_err(),
        "input",
    );
    assert_invalid(
        handler.update_post(1, PostPatch::default()).await.unwrap_err(),
        "input",
    );
    assert_invalid(
        handler
            .update_post(
                1,
                PostPatch {
                    content: Some("\n".to_string()),
                    user_id: None,
                },
            )
            .await
            .unwrap_err(),
        "content",
    );
    assert_eq!(store.writes(), 0);
}

// ============================================================
// Section 3: Mutation Delegation
// ============================================================

#[tokio::test]
async fn test_update_missing_user_returns_variant() {
    let store = MockStore::seeded();
    let handler = MutationHandler::new(Arc::clone(&store));

    let result = handler
        .update_user(
            99,
            UserPatch {
                name: Some("Ghost".to_string()),
                age: None,
            },
        )
        .await
        .unwrap();

    match result {
        UserMutation::UserNotFoundError(err) => {
            assert_eq!(err.code, NotFoundCode::UserNotFound);
            assert_eq!(err.requested_id, 99);
        }
        other => panic!("expected UserNotFoundError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_create_post_for_missing_author_returns_variant() {
    let store = MockStore::seeded();
    let handler = MutationHandler::new(Arc::clone(&store));

    let result = handler
        .create_post(NewPost {
            content: "hi".to_string(),
            user_id: 42,
        })
        .await
        .unwrap();

    match result {
        PostMutation::UserNotFoundError(err) => assert_eq!(err.field, "userId"),
        other => panic!("expected UserNotFoundError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_delete_user_then_queries_see_cascade() {
    let store = MockStore::seeded();
    let mutations = MutationHandler::new(Arc::clone(&store));
    let queries = query_handler(&store);

    let result = mutations.delete_user(1).await.unwrap();
    assert_eq!(result, UserMutation::Success(Deleted { id: 1 }));

    let posts = queries.posts().await.unwrap().data;
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].post.user_id, 2);
}

#[tokio::test]
async fn test_duplicate_user_id_surfaces_domain_error() {
    let store = MockStore::seeded();
    let handler = MutationHandler::new(Arc::clone(&store));

    let err = handler
        .create_user(NewUser {
            id: Some(1),
            name: "Clone".to_string(),
            age: 9,
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        MutationError::Domain(DomainError::DuplicateEntity { id: 1, .. })
    ));
}
