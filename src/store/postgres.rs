//! PostgreSQL tree store for production use.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)
//!
//! ## Schema
//!
//! An adjacency list: one row per ThreadRoot, one row per message with a
//! nullable `parent_id` (NULL = child of the root). Deleting a root cascades
//! to its messages. See [`TREE_TABLES_SCHEMA`].

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::time::Duration;

use crate::error::TreeError;
use crate::types::{Message, MessageId, ParentRef, ThreadId, ThreadRoot, ThreadTree, Triple};

use super::TreeStore;

/// DDL for the tables this store expects.
pub const TREE_TABLES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS thread_roots (
    thread_id TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS thread_messages (
    thread_id TEXT NOT NULL REFERENCES thread_roots(thread_id) ON DELETE CASCADE,
    id        TEXT NOT NULL,
    parent_id TEXT,
    latest    BOOLEAN NOT NULL DEFAULT FALSE,
    PRIMARY KEY (thread_id, id)
);

CREATE INDEX IF NOT EXISTS idx_thread_messages_parent
    ON thread_messages (thread_id, parent_id);
"#;

/// Configuration for the PostgreSQL connection pool.
///
/// Production defaults balance concurrency with connection limits; timeouts
/// are aggressive to fail fast, and max lifetime forces periodic
/// reconnection for health.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum connections in pool (default: 10).
    pub max_connections: u32,
    /// Minimum idle connections to keep warm (default: 2).
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds (default: 300 = 5 min).
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime in seconds (default: 1800 = 30 min).
    pub max_lifetime_secs: u64,
}

impl PostgresConfig {
    /// Load configuration from environment variables with production defaults.
    pub fn from_env() -> Self {
        let var = |name: &str, default: u64| {
            std::env::var(name)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/arbor".to_string()),
            max_connections: var("DB_MAX_CONNECTIONS", 10) as u32,
            min_connections: var("DB_MIN_CONNECTIONS", 2) as u32,
            connect_timeout_secs: var("DB_CONNECT_TIMEOUT_SECS", 10),
            idle_timeout_secs: var("DB_IDLE_TIMEOUT_SECS", 300),
            max_lifetime_secs: var("DB_MAX_LIFETIME_SECS", 1800),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// PostgreSQL tree store.
///
/// Mutations run inside transactions so they apply entirely or not at all;
/// reads run single statements and therefore observe consistent snapshots.
pub struct PostgresTreeStore {
    pool: PgPool,
}

fn connection(e: sqlx::Error) -> TreeError {
    TreeError::Connection(e.to_string())
}

impl PostgresTreeStore {
    /// Connect with the given configuration.
    pub async fn connect(config: PostgresConfig) -> Result<Self, TreeError> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            idle_timeout_secs = config.idle_timeout_secs,
            max_lifetime_secs = config.max_lifetime_secs,
            "Initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await
            .map_err(connection)?;

        Ok(Self { pool })
    }

    /// Connect from environment variables.
    pub async fn from_env() -> Result<Self, TreeError> {
        Self::connect(PostgresConfig::from_env()).await
    }

    /// Create the expected tables if they do not exist.
    pub async fn migrate(&self) -> Result<(), TreeError> {
        sqlx::raw_sql(TREE_TABLES_SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(connection)?;
        Ok(())
    }

    /// The connection pool, for health checks.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Whether the database is reachable.
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    /// Pool statistics for monitoring.
    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max: self.pool.options().get_max_connections(),
        }
    }

    fn parent_ref(parent_id: Option<String>) -> ParentRef {
        match parent_id {
            None => ParentRef::Root,
            Some(id) => ParentRef::Message(MessageId::new(id)),
        }
    }
}

/// Pool statistics for monitoring.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    /// Current pool size.
    pub size: u32,
    /// Number of idle connections.
    pub idle: usize,
    /// Maximum pool size.
    pub max: u32,
}

#[async_trait]
impl TreeStore for PostgresTreeStore {
    async fn ping(&self) -> Result<(), TreeError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
            .map_err(connection)
    }

    async fn root_exists(&self, thread: &ThreadId) -> Result<bool, TreeError> {
        let row = sqlx::query("SELECT 1 FROM thread_roots WHERE thread_id = $1")
            .bind(thread.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(connection)?;
        Ok(row.is_some())
    }

    async fn get_message(
        &self,
        thread: &ThreadId,
        id: &MessageId,
    ) -> Result<Option<Message>, TreeError> {
        let row = sqlx::query(
            "SELECT id, latest FROM thread_messages WHERE thread_id = $1 AND id = $2",
        )
        .bind(thread.as_str())
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(connection)?;

        Ok(row.map(|r| Message {
            id: MessageId::new(r.get::<String, _>("id")),
            latest: r.get("latest"),
        }))
    }

    async fn parent_of(
        &self,
        thread: &ThreadId,
        id: &MessageId,
    ) -> Result<Option<ParentRef>, TreeError> {
        let row = sqlx::query(
            "SELECT parent_id FROM thread_messages WHERE thread_id = $1 AND id = $2",
        )
        .bind(thread.as_str())
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(connection)?;

        Ok(row.map(|r| Self::parent_ref(r.get("parent_id"))))
    }

    async fn children_of(
        &self,
        thread: &ThreadId,
        parent: &ParentRef,
    ) -> Result<Vec<MessageId>, TreeError> {
        let rows = match parent {
            ParentRef::Root => {
                sqlx::query(
                    "SELECT id FROM thread_messages \
                     WHERE thread_id = $1 AND parent_id IS NULL ORDER BY id",
                )
                .bind(thread.as_str())
                .fetch_all(&self.pool)
                .await
            }
            ParentRef::Message(parent_id) => {
                sqlx::query(
                    "SELECT id FROM thread_messages \
                     WHERE thread_id = $1 AND parent_id = $2 ORDER BY id",
                )
                .bind(thread.as_str())
                .bind(parent_id.as_str())
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(connection)?;

        Ok(rows
            .iter()
            .map(|r| MessageId::new(r.get::<String, _>("id")))
            .collect())
    }

    async fn latest_message(&self, thread: &ThreadId) -> Result<Option<Message>, TreeError> {
        let row = sqlx::query(
            "SELECT id FROM thread_messages WHERE thread_id = $1 AND latest LIMIT 1",
        )
        .bind(thread.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(connection)?;

        Ok(row.map(|r| Message {
            id: MessageId::new(r.get::<String, _>("id")),
            latest: true,
        }))
    }

    async fn snapshot(&self, thread: &ThreadId) -> Result<Option<ThreadTree>, TreeError> {
        if !self.root_exists(thread).await? {
            return Ok(None);
        }
        let rows = sqlx::query(
            "SELECT id, parent_id, latest FROM thread_messages \
             WHERE thread_id = $1 ORDER BY id",
        )
        .bind(thread.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(connection)?;

        let mut messages = Vec::with_capacity(rows.len());
        let mut relations = Vec::with_capacity(rows.len());
        for r in &rows {
            let id = MessageId::new(r.get::<String, _>("id"));
            messages.push(Message {
                id: id.clone(),
                latest: r.get("latest"),
            });
            relations.push(Triple::child(Self::parent_ref(r.get("parent_id")), id));
        }
        let mut tree = ThreadTree::new(ThreadRoot::new(thread.clone()), messages, relations);
        tree.normalize();
        Ok(Some(tree))
    }

    async fn insert_child(
        &self,
        thread: &ThreadId,
        parent: &ParentRef,
        child: Message,
    ) -> Result<(), TreeError> {
        let mut tx = self.pool.begin().await.map_err(connection)?;

        // Re-check the parent inside the transaction; the engine's check ran
        // outside it.
        match parent {
            ParentRef::Root => {
                let root = sqlx::query("SELECT 1 FROM thread_roots WHERE thread_id = $1")
                    .bind(thread.as_str())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(connection)?;
                if root.is_none() {
                    return Err(TreeError::ParentNotFound(format!(
                        "thread {thread} has no root"
                    )));
                }
            }
            ParentRef::Message(parent_id) => {
                let row = sqlx::query(
                    "SELECT 1 FROM thread_messages WHERE thread_id = $1 AND id = $2",
                )
                .bind(thread.as_str())
                .bind(parent_id.as_str())
                .fetch_optional(&mut *tx)
                .await
                .map_err(connection)?;
                if row.is_none() {
                    return Err(TreeError::ParentNotFound(parent_id.to_string()));
                }
            }
        }

        sqlx::query(
            "INSERT INTO thread_messages (thread_id, id, parent_id, latest) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (thread_id, id) DO NOTHING",
        )
        .bind(thread.as_str())
        .bind(child.id.as_str())
        .bind(parent.message_id().map(|p| p.as_str()))
        .bind(child.latest)
        .execute(&mut *tx)
        .await
        .map_err(connection)?;

        tx.commit().await.map_err(connection)
    }

    async fn put_tree(&self, tree: &ThreadTree) -> Result<(), TreeError> {
        let thread = &tree.root.thread_id;
        let mut tx = self.pool.begin().await.map_err(connection)?;

        sqlx::query("INSERT INTO thread_roots (thread_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(thread.as_str())
            .execute(&mut *tx)
            .await
            .map_err(connection)?;

        // Merge semantics: existing rows keep their parent, so re-loading an
        // identical tree is a no-op.
        for t in &tree.relations {
            sqlx::query(
                "INSERT INTO thread_messages (thread_id, id, parent_id, latest) \
                 VALUES ($1, $2, $3, FALSE) \
                 ON CONFLICT (thread_id, id) DO NOTHING",
            )
            .bind(thread.as_str())
            .bind(t.end_id.as_str())
            .bind(t.parent().message_id().map(|p| p.as_str().to_string()))
            .execute(&mut *tx)
            .await
            .map_err(connection)?;
        }

        if let Some(latest) = tree.latest() {
            sqlx::query("UPDATE thread_messages SET latest = FALSE WHERE thread_id = $1 AND latest")
                .bind(thread.as_str())
                .execute(&mut *tx)
                .await
                .map_err(connection)?;
            sqlx::query(
                "UPDATE thread_messages SET latest = TRUE WHERE thread_id = $1 AND id = $2",
            )
            .bind(thread.as_str())
            .bind(latest.id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(connection)?;
        }

        tx.commit().await.map_err(connection)
    }

    async fn set_latest(&self, thread: &ThreadId, id: &MessageId) -> Result<Message, TreeError> {
        let mut tx = self.pool.begin().await.map_err(connection)?;

        sqlx::query("UPDATE thread_messages SET latest = FALSE WHERE thread_id = $1 AND latest")
            .bind(thread.as_str())
            .execute(&mut *tx)
            .await
            .map_err(connection)?;
        let updated = sqlx::query(
            "UPDATE thread_messages SET latest = TRUE WHERE thread_id = $1 AND id = $2",
        )
        .bind(thread.as_str())
        .bind(id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(connection)?;

        if updated.rows_affected() == 0 {
            // Roll back the clear; the target does not exist.
            tx.rollback().await.map_err(connection)?;
            return Err(TreeError::message_not_found(id));
        }
        tx.commit().await.map_err(connection)?;
        Ok(Message {
            id: id.clone(),
            latest: true,
        })
    }

    async fn remove_messages(
        &self,
        thread: &ThreadId,
        ids: &[MessageId],
    ) -> Result<(), TreeError> {
        let raw: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();
        sqlx::query("DELETE FROM thread_messages WHERE thread_id = $1 AND id = ANY($2)")
            .bind(thread.as_str())
            .bind(&raw)
            .execute(&self.pool)
            .await
            .map_err(connection)?;
        Ok(())
    }

    async fn remove_thread(&self, thread: &ThreadId) -> Result<(), TreeError> {
        let result = sqlx::query("DELETE FROM thread_roots WHERE thread_id = $1")
            .bind(thread.as_str())
            .execute(&self.pool)
            .await
            .map_err(connection)?;
        if result.rows_affected() == 0 {
            return Err(TreeError::thread_not_found(thread));
        }
        Ok(())
    }
}
