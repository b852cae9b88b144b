//! SQLite storage implementation.

use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, Transaction};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument};

use crate::error::{StorageError, StorageResult};
use crate::traits::{
    DataStore, Dataset, HealthStatus, NewPostRow, NewUserRow, PostChanges, PostRow, UserChanges,
    UserRow, WriteOutcome,
};

/// Default health check timeout in seconds.
const DEFAULT_HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;

/// Default query timeout in seconds.
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

const BACKEND: &str = "sqlite";

/// SQLite configuration options.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database URL, e.g. `sqlite://loadgraph.db` or `sqlite::memory:`.
    pub database_url: String,
    /// Maximum number of connections in the pool. Forced to 1 for
    /// in-memory databases, which exist per connection.
    pub max_connections: u32,
    /// Connection acquire timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Maximum time a single operation (including its transaction) may take.
    pub query_timeout_secs: u64,
    pub health_check_timeout_secs: u64,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://loadgraph.db".to_string(),
            max_connections: 5,
            connect_timeout_secs: 30,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
            health_check_timeout_secs: DEFAULT_HEALTH_CHECK_TIMEOUT_SECS,
        }
    }
}

impl SqliteConfig {
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Default::default()
        }
    }

    fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }
}

/// SQLite implementation of DataStore.
///
/// Mutations run one at a time. Each one reads before it writes, and two
/// deferred transactions doing that concurrently cannot both upgrade to a
/// write lock; SQLite fails one of them with `SQLITE_BUSY` without waiting.
pub struct SqliteDataStore {
    pool: SqlitePool,
    writer: Mutex<()>,
    query_timeout: Duration,
    health_check_timeout: Duration,
}

fn query_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> StorageError {
    move |e| StorageError::QueryError {
        message: format!("{context}: {e}"),
    }
}

fn transaction_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> StorageError {
    move |e| StorageError::TransactionError {
        message: format!("{context}: {e}"),
    }
}

fn row_to_user(row: SqliteRow) -> StorageResult<UserRow> {
    Ok(UserRow {
        id: row.try_get("id").map_err(query_error("decode users.id"))?,
        name: row.try_get("name").map_err(query_error("decode users.name"))?,
        age: row.try_get("age").map_err(query_error("decode users.age"))?,
    })
}

fn row_to_post(row: SqliteRow) -> StorageResult<PostRow> {
    Ok(PostRow {
        id: row.try_get("id").map_err(query_error("decode posts.id"))?,
        content: row
            .try_get("content")
            .map_err(query_error("decode posts.content"))?,
        user_id: row
            .try_get("user_id")
            .map_err(query_error("decode posts.user_id"))?,
    })
}

async fn user_exists(conn: &mut SqliteConnection, id: i64) -> StorageResult<bool> {
    let row = sqlx::query("SELECT 1 FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(query_error("Failed to check user"))?;
    Ok(row.is_some())
}

async fn post_exists(conn: &mut SqliteConnection, id: i64) -> StorageResult<bool> {
    let row = sqlx::query("SELECT 1 FROM posts WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(query_error("Failed to check post"))?;
    Ok(row.is_some())
}

impl SqliteDataStore {
    /// Creates a data store from an existing pool with default timeouts.
    ///
    /// The pool must have foreign keys enabled for cascading deletes.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            writer: Mutex::new(()),
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            health_check_timeout: Duration::from_secs(DEFAULT_HEALTH_CHECK_TIMEOUT_SECS),
        }
    }

    /// Opens (creating if needed) the database described by `config`.
    #[instrument(skip(config))]
    pub async fn from_config(config: &SqliteConfig) -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(|e| StorageError::ConnectionError {
                message: format!("invalid database url: {e}"),
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs));
        pool_options = if config.is_in_memory() {
            // The database disappears with its last connection.
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(config.max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionError {
                message: e.to_string(),
            })?;

        Ok(Self {
            pool,
            writer: Mutex::new(()),
            query_timeout: Duration::from_secs(config.query_timeout_secs),
            health_check_timeout: Duration::from_secs(config.health_check_timeout_secs),
        })
    }

    /// Creates a data store from a database URL with default settings.
    pub async fn from_url(database_url: &str) -> StorageResult<Self> {
        let config = SqliteConfig {
            database_url: database_url.to_string(),
            ..Default::default()
        };
        Self::from_config(&config).await
    }

    /// Takes the writer lock, then opens a transaction. The guard must outlive
    /// the transaction.
    async fn begin_write(
        &self,
    ) -> StorageResult<(MutexGuard<'_, ()>, Transaction<'static, Sqlite>)> {
        let guard = self.writer.lock().await;
        let tx = self
            .pool
            .begin()
            .await
            .map_err(transaction_error("Failed to begin transaction"))?;
        Ok((guard, tx))
    }

    /// Wraps an async operation with the query timeout and records metrics.
    ///
    /// # Metrics
    /// - `loadgraph_storage_query_duration_seconds` - Histogram of query durations
    /// - `loadgraph_storage_query_timeout_total` - Counter of timeout events
    async fn execute_with_timeout<T, F>(&self, operation: &str, future: F) -> StorageResult<T>
    where
        F: std::future::Future<Output = StorageResult<T>>,
    {
        let start = Instant::now();
        let result = tokio::time::timeout(self.query_timeout, future).await;
        let duration = start.elapsed().as_secs_f64();

        let (status, final_result) = match result {
            Ok(Ok(value)) => ("success", Ok(value)),
            Ok(Err(e)) => ("error", Err(e)),
            Err(_elapsed) => (
                "timeout",
                Err(StorageError::QueryTimeout {
                    operation: operation.to_string(),
                    timeout: self.query_timeout,
                }),
            ),
        };

        metrics::histogram!(
            "loadgraph_storage_query_duration_seconds",
            "operation" => operation.to_string(),
            "backend" => BACKEND,
            "status" => status
        )
        .record(duration);

        if status == "timeout" {
            metrics::counter!(
                "loadgraph_storage_query_timeout_total",
                "operation" => operation.to_string(),
                "backend" => BACKEND
            )
            .increment(1);
        }

        final_result
    }

    /// Runs database migrations to create required tables.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> StorageResult<()> {
        debug!("Running database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                age INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(query_error("Failed to create users table"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY NOT NULL,
                content TEXT NOT NULL,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(query_error("Failed to create posts table"))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_user_id ON posts(user_id)")
            .execute(&self.pool)
            .await
            .map_err(query_error("Failed to create posts index"))?;

        debug!("Database migrations completed");
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DataStore for SqliteDataStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    #[instrument(skip(self))]
    async fn list_users(&self) -> StorageResult<Vec<UserRow>> {
        self.execute_with_timeout("list_users", async {
            sqlx::query("SELECT id, name, age FROM users ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(query_error("Failed to list users"))?
                .into_iter()
                .map(row_to_user)
                .collect()
        })
        .await
    }

    #[instrument(skip(self))]
    async fn get_user(&self, id: i64) -> StorageResult<Option<UserRow>> {
        self.execute_with_timeout("get_user", async {
            sqlx::query("SELECT id, name, age FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(query_error("Failed to get user"))?
                .map(row_to_user)
                .transpose()
        })
        .await
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn get_users_by_ids(&self, ids: &[i64]) -> StorageResult<Vec<UserRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.execute_with_timeout("get_users_by_ids", async {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT id, name, age FROM users WHERE id IN (");
            let mut separated = builder.separated(", ");
            for id in ids {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");

            builder
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(query_error("Failed to get users by ids"))?
                .into_iter()
                .map(row_to_user)
                .collect()
        })
        .await
    }

    #[instrument(skip(self))]
    async fn list_posts(&self) -> StorageResult<Vec<PostRow>> {
        self.execute_with_timeout("list_posts", async {
            sqlx::query("SELECT id, content, user_id FROM posts ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(query_error("Failed to list posts"))?
                .into_iter()
                .map(row_to_post)
                .collect()
        })
        .await
    }

    #[instrument(skip(self))]
    async fn get_post(&self, id: i64) -> StorageResult<Option<PostRow>> {
        self.execute_with_timeout("get_post", async {
            sqlx::query("SELECT id, content, user_id FROM posts WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(query_error("Failed to get post"))?
                .map(row_to_post)
                .transpose()
        })
        .await
    }

    #[instrument(skip(self, user_ids), fields(count = user_ids.len()))]
    async fn find_posts_by_user_ids(&self, user_ids: &[i64]) -> StorageResult<Vec<PostRow>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.execute_with_timeout("find_posts_by_user_ids", async {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT id, content, user_id FROM posts WHERE user_id IN (");
            let mut separated = builder.separated(", ");
            for id in user_ids {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");

            builder
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(query_error("Failed to find posts by user ids"))?
                .into_iter()
                .map(row_to_post)
                .collect()
        })
        .await
    }

    #[instrument(skip(self, user), fields(id = ?user.id))]
    async fn create_user(&self, user: NewUserRow) -> StorageResult<UserRow> {
        // On timeout the transaction is rolled back when `tx` is dropped.
        self.execute_with_timeout("create_user", async {
            let (_writer, mut tx) = self.begin_write().await?;

            if let Some(id) = user.id {
                if user_exists(&mut *tx, id).await? {
                    return Err(StorageError::DuplicateRow { table: "users", id });
                }
            }

            let row = sqlx::query(
                "INSERT INTO users (id, name, age) VALUES (?, ?, ?) RETURNING id, name, age",
            )
            .bind(user.id)
            .bind(&user.name)
            .bind(user.age)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| match user.id {
                Some(id)
                    if e.as_database_error()
                        .is_some_and(|db| db.is_unique_violation()) =>
                {
                    StorageError::DuplicateRow { table: "users", id }
                }
                _ => StorageError::QueryError {
                    message: format!("Failed to insert user: {e}"),
                },
            })?;
            let created = row_to_user(row)?;

            tx.commit()
                .await
                .map_err(transaction_error("Failed to commit transaction"))?;
            Ok(created)
        })
        .await
    }

    #[instrument(skip(self, changes))]
    async fn update_user(
        &self,
        id: i64,
        changes: UserChanges,
    ) -> StorageResult<WriteOutcome<UserRow>> {
        self.execute_with_timeout("update_user", async {
            let (_writer, mut tx) = self.begin_write().await?;

            if !user_exists(&mut *tx, id).await? {
                return Ok(WriteOutcome::MissingUser(id));
            }

            let row = sqlx::query(
                "UPDATE users SET name = COALESCE(?, name), age = COALESCE(?, age) \
                 WHERE id = ? RETURNING id, name, age",
            )
            .bind(changes.name)
            .bind(changes.age)
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(query_error("Failed to update user"))?;
            let updated = row_to_user(row)?;

            tx.commit()
                .await
                .map_err(transaction_error("Failed to commit transaction"))?;
            Ok(WriteOutcome::Applied(updated))
        })
        .await
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, id: i64) -> StorageResult<WriteOutcome<i64>> {
        self.execute_with_timeout("delete_user", async {
            let (_writer, mut tx) = self.begin_write().await?;

            if !user_exists(&mut *tx, id).await? {
                return Ok(WriteOutcome::MissingUser(id));
            }

            // Posts go with the user through ON DELETE CASCADE.
            sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(query_error("Failed to delete user"))?;

            tx.commit()
                .await
                .map_err(transaction_error("Failed to commit transaction"))?;
            Ok(WriteOutcome::Applied(id))
        })
        .await
    }

    #[instrument(skip(self, post), fields(user_id = post.user_id))]
    async fn create_post(&self, post: NewPostRow) -> StorageResult<WriteOutcome<PostRow>> {
        self.execute_with_timeout("create_post", async {
            let (_writer, mut tx) = self.begin_write().await?;

            if !user_exists(&mut *tx, post.user_id).await? {
                return Ok(WriteOutcome::MissingUser(post.user_id));
            }

            let row = sqlx::query(
                "INSERT INTO posts (content, user_id) VALUES (?, ?) RETURNING id, content, user_id",
            )
            .bind(&post.content)
            .bind(post.user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(query_error("Failed to insert post"))?;
            let created = row_to_post(row)?;

            tx.commit()
                .await
                .map_err(transaction_error("Failed to commit transaction"))?;
            Ok(WriteOutcome::Applied(created))
        })
        .await
    }

    #[instrument(skip(self, changes))]
    async fn update_post(
        &self,
        id: i64,
        changes: PostChanges,
    ) -> StorageResult<WriteOutcome<PostRow>> {
        self.execute_with_timeout("update_post", async {
            let (_writer, mut tx) = self.begin_write().await?;

            if !post_exists(&mut *tx, id).await? {
                return Ok(WriteOutcome::MissingPost(id));
            }
            if let Some(user_id) = changes.user_id {
                if !user_exists(&mut *tx, user_id).await? {
                    return Ok(WriteOutcome::MissingUser(user_id));
                }
            }

            let row = sqlx::query(
                "UPDATE posts SET content = COALESCE(?, content), user_id = COALESCE(?, user_id) \
                 WHERE id = ? RETURNING id, content, user_id",
            )
            .bind(changes.content)
            .bind(changes.user_id)
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(query_error("Failed to update post"))?;
            let updated = row_to_post(row)?;

            tx.commit()
                .await
                .map_err(transaction_error("Failed to commit transaction"))?;
            Ok(WriteOutcome::Applied(updated))
        })
        .await
    }

    #[instrument(skip(self))]
    async fn delete_post(&self, id: i64) -> StorageResult<WriteOutcome<i64>> {
        self.execute_with_timeout("delete_post", async {
            let (_writer, mut tx) = self.begin_write().await?;

            if !post_exists(&mut *tx, id).await? {
                return Ok(WriteOutcome::MissingPost(id));
            }

            sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(query_error("Failed to delete post"))?;

            tx.commit()
                .await
                .map_err(transaction_error("Failed to commit transaction"))?;
            Ok(WriteOutcome::Applied(id))
        })
        .await
    }

    #[instrument(skip(self, dataset), fields(users = dataset.users.len(), posts = dataset.posts.len()))]
    async fn replace_all(&self, dataset: Dataset) -> StorageResult<()> {
        dataset.validate()?;
        self.execute_with_timeout("replace_all", async {
            let (_writer, mut tx) = self.begin_write().await?;

            sqlx::query("DELETE FROM posts")
                .execute(&mut *tx)
                .await
                .map_err(query_error("Failed to clear posts"))?;
            sqlx::query("DELETE FROM users")
                .execute(&mut *tx)
                .await
                .map_err(query_error("Failed to clear users"))?;

            for user in &dataset.users {
                sqlx::query("INSERT INTO users (id, name, age) VALUES (?, ?, ?)")
                    .bind(user.id)
                    .bind(&user.name)
                    .bind(user.age)
                    .execute(&mut *tx)
                    .await
                    .map_err(query_error("Failed to insert user"))?;
            }
            for post in &dataset.posts {
                sqlx::query("INSERT INTO posts (id, content, user_id) VALUES (?, ?, ?)")
                    .bind(post.id)
                    .bind(&post.content)
                    .bind(post.user_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(query_error("Failed to insert post"))?;
            }

            tx.commit()
                .await
                .map_err(transaction_error("Failed to commit transaction"))?;
            Ok(())
        })
        .await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let start = Instant::now();

        let check_result = tokio::time::timeout(self.health_check_timeout, async {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::HealthCheckFailed {
                    message: format!("database ping failed: {e}"),
                })
        })
        .await;

        let latency = start.elapsed();

        let status = match &check_result {
            Ok(Ok(_)) => "success",
            Ok(Err(_)) => "error",
            Err(_) => "timeout",
        };
        metrics::histogram!(
            "loadgraph_storage_health_check_duration_seconds",
            "backend" => BACKEND,
            "status" => status
        )
        .record(latency.as_secs_f64());

        match check_result {
            Ok(result) => {
                result?;
            }
            Err(_elapsed) => {
                metrics::counter!(
                    "loadgraph_storage_query_timeout_total",
                    "operation" => "health_check",
                    "backend" => BACKEND
                )
                .increment(1);
                return Err(StorageError::QueryTimeout {
                    operation: "health_check".to_string(),
                    timeout: self.health_check_timeout,
                });
            }
        }

        Ok(HealthStatus {
            healthy: true,
            latency,
            backend: BACKEND,
        })
    }
}
