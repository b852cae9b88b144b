//! SQLite Integration Tests.
//!
//! File-backed databases in a temporary directory: migrations, persistence
//! across reopen, foreign key enforcement and health checks.

use std::sync::Arc;

use loadgraph_storage::{
    seed, DataStore, NewPostRow, SqliteConfig, SqliteDataStore, StorageError, UserChanges,
    WriteOutcome,
};

fn file_config(dir: &tempfile::TempDir) -> SqliteConfig {
    SqliteConfig {
        database_url: format!("sqlite://{}", dir.path().join("loadgraph.db").display()),
        max_connections: 4,
        ..Default::default()
    }
}

async fn open(config: &SqliteConfig) -> SqliteDataStore {
    let store = SqliteDataStore::from_config(config)
        .await
        .expect("Failed to open SQLite file");
    store
        .run_migrations()
        .await
        .expect("Failed to run migrations");
    store
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&file_config(&dir)).await;

    store.run_migrations().await.unwrap();
    store.run_migrations().await.unwrap();

    assert!(store.list_users().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&dir);

    {
        let store = open(&config).await;
        seed(&store).await.unwrap();
        store
            .create_post(NewPostRow {
                content: "persisted".to_string(),
                user_id: 2,
            })
            .await
            .unwrap();
        store.pool().close().await;
    }

    let reopened = open(&config).await;
    let posts = reopened.find_posts_by_user_ids(&[2]).await.unwrap();
    assert_eq!(posts.len(), 2);
    assert!(posts.iter().any(|p| p.content == "persisted"));
}

#[tokio::test]
async fn test_foreign_keys_are_enforced() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&file_config(&dir)).await;
    seed(&store).await.unwrap();

    let raw = sqlx::query("INSERT INTO posts (content, user_id) VALUES ('raw', 99)")
        .execute(store.pool())
        .await;
    assert!(raw.is_err(), "orphan insert must violate the foreign key");

    assert_eq!(
        store.delete_user(2).await.unwrap(),
        WriteOutcome::Applied(2)
    );
    assert!(store.find_posts_by_user_ids(&[2]).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mutations_on_file_database_all_apply() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(open(&file_config(&dir)).await);
    seed(store.as_ref()).await.unwrap();

    let updates = (0..20).map(|i| {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            store
                .update_user(
                    1,
                    UserChanges {
                        name: None,
                        age: Some(30 + i),
                    },
                )
                .await
                .map(|outcome| matches!(outcome, WriteOutcome::Applied(_)))
        })
    });
    let creates = (0..20).map(|i| {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            store
                .create_post(NewPostRow {
                    content: format!("parallel-{i}"),
                    user_id: 2,
                })
                .await
                .map(|outcome| matches!(outcome, WriteOutcome::Applied(_)))
        })
    });
    let handles: Vec<_> = updates.chain(creates).collect();

    for result in futures::future::join_all(handles).await {
        let applied = result.unwrap().unwrap_or_else(|e| panic!("mutation failed: {e}"));
        assert!(applied);
    }

    assert_eq!(store.find_posts_by_user_ids(&[2]).await.unwrap().len(), 21);
    let age = store.get_user(1).await.unwrap().unwrap().age;
    assert!((30..50).contains(&age), "age {age} comes from one of the updates");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deletes_of_one_post_report_a_single_success() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(open(&file_config(&dir)).await);
    seed(store.as_ref()).await.unwrap();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.delete_post(1).await })
        })
        .collect();

    let outcomes: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    let applied = outcomes
        .iter()
        .filter(|o| **o == WriteOutcome::Applied(1))
        .count();
    assert_eq!(applied, 1);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, WriteOutcome::Applied(1) | WriteOutcome::MissingPost(1))));
}

#[tokio::test]
async fn test_health_check_reports_backend() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&file_config(&dir)).await;

    let health = store.health_check().await.unwrap();

    assert!(health.healthy);
    assert_eq!(health.backend, "sqlite");
}

#[tokio::test]
async fn test_health_check_fails_on_closed_pool() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&file_config(&dir)).await;
    store.pool().close().await;

    let err = store.health_check().await.unwrap_err();

    assert!(matches!(err, StorageError::HealthCheckFailed { .. }));
}

#[tokio::test]
async fn test_unopenable_path_is_a_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = SqliteConfig {
        database_url: format!(
            "sqlite://{}",
            dir.path().join("missing").join("loadgraph.db").display()
        ),
        ..Default::default()
    };

    let err = SqliteDataStore::from_config(&config).await.err().unwrap();

    assert!(matches!(err, StorageError::ConnectionError { .. }));
}
