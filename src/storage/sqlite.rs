use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};
use uuid::Uuid;

use super::{history_limit, ChatRecord, KeyValueStore, Repository};
use crate::config::DatabaseConfig;
use crate::error::{StoreError, StoreResult};
use crate::pipeline::FiveWhySession;
use crate::vector::{
    clamp_limit, rank_by_distance, validate_document, validate_query, VectorDocument, VectorStore,
};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed vector, key/value and repository storage.
///
/// Vector search is brute force over every stored embedding.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
    dimension: Option<usize>,
}

impl SqliteStorage {
    /// Open (creating if needed) the database file and run migrations
    pub async fn new(config: &DatabaseConfig) -> StoreResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Connection {
                    message: format!("Failed to create database directory: {}", e),
                })?;
            }
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StoreError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self {
            pool,
            dimension: None,
        };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create a private in-memory database, for tests and ephemeral runs
    pub async fn new_in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            StoreError::Connection {
                message: format!("Invalid database URL: {}", e),
            }
        })?;

        // Every connection to :memory: is a separate database, so keep exactly one alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self {
            pool,
            dimension: None,
        };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Reject embeddings whose length is not `dimension`
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StoreResult<()> {
        info!("Running database migrations...");

        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Migration {
                message: format!("Failed to run migrations: {}", e),
            })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    // Fixed precision keeps the text column sortable.
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Query {
            message: format!("Invalid timestamp '{}': {}", value, e),
        })
}

#[async_trait]
impl VectorStore for SqliteStorage {
    async fn init(&self) -> StoreResult<()> {
        self.run_migrations().await
    }

    async fn store(&self, document: VectorDocument) -> StoreResult<()> {
        validate_document(&document, self.dimension)?;

        let embedding = serde_json::to_string(&document.embedding)?;
        let metadata = serde_json::to_string(&document.metadata)?;

        sqlx::query(
            r#"
            INSERT INTO vector_memory (id, content, embedding, metadata, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                content = excluded.content,
                embedding = excluded.embedding,
                metadata = excluded.metadata
            "#,
        )
        .bind(&document.id)
        .bind(&document.content)
        .bind(&embedding)
        .bind(&metadata)
        .bind(timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        debug!(id = %document.id, "Stored vector document");
        Ok(())
    }

    async fn search(&self, vector: &[f32], limit: i32) -> StoreResult<Vec<VectorDocument>> {
        validate_query(vector, self.dimension)?;

        let rows: Vec<VectorRow> = sqlx::query_as(
            r#"
            SELECT id, content, embedding, metadata
            FROM vector_memory
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let documents = rows
            .into_iter()
            .map(VectorDocument::try_from)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(rank_by_distance(vector, documents, clamp_limit(limit)))
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM vector_memory WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SqliteStorage {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| StoreError::Query {
            message: format!("TTL out of range: {}", e),
        })?;

        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(timestamp(Utc::now() + ttl))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT value, expires_at FROM kv_entries WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        let Some((value, expires_at)) = row else {
            return Ok(None);
        };

        if parse_timestamp(&expires_at)? <= Utc::now() {
            sqlx::query("DELETE FROM kv_entries WHERE key = ? AND expires_at = ?")
                .bind(key)
                .bind(&expires_at)
                .execute(&self.pool)
                .await?;
            return Ok(None);
        }

        Ok(Some(value))
    }
}

#[async_trait]
impl Repository for SqliteStorage {
    async fn save_message(
        &self,
        session_id: &str,
        user_id: &str,
        user_msg: &str,
        ai_msg: &str,
    ) -> StoreResult<()> {
        if session_id.is_empty() {
            return Err(StoreError::MissingSessionId);
        }

        sqlx::query(
            r#"
            INSERT INTO chat_messages (id, session_id, user_id, user_msg, ai_msg, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(session_id)
        .bind(user_id)
        .bind(user_msg)
        .bind(ai_msg)
        .bind(timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_five_why_session(
        &self,
        user_id: &str,
        session: &FiveWhySession,
    ) -> StoreResult<()> {
        let steps = serde_json::to_string(&session.steps)?;
        let root_cause = serde_json::to_string(&session.root_cause)?;
        let solution = serde_json::to_string(&session.solution)?;
        let reframed = serde_json::to_string(&session.reframed)?;

        sqlx::query(
            r#"
            INSERT INTO five_why_sessions
                (id, user_id, session_id, steps, root_cause, solution, reframed, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(&session.session_id)
        .bind(&steps)
        .bind(&root_cause)
        .bind(&solution)
        .bind(&reframed)
        .bind(timestamp(session.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_session_history(
        &self,
        session_id: &str,
        limit: i32,
    ) -> StoreResult<Vec<ChatRecord>> {
        if session_id.is_empty() {
            return Err(StoreError::MissingSessionId);
        }

        let rows: Vec<ChatRow> = sqlx::query_as(
            r#"
            SELECT id, session_id, user_id, user_msg, ai_msg, created_at
            FROM chat_messages
            WHERE session_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(session_id)
        .bind(history_limit(limit) as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ChatRecord::try_from).collect()
    }
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct VectorRow {
    id: String,
    content: String,
    embedding: String,
    metadata: String,
}

impl TryFrom<VectorRow> for VectorDocument {
    type Error = StoreError;

    fn try_from(row: VectorRow) -> StoreResult<Self> {
        let embedding: Vec<f32> = serde_json::from_str(&row.embedding)?;
        let metadata: HashMap<String, String> = serde_json::from_str(&row.metadata)?;

        Ok(Self {
            id: row.id,
            content: row.content,
            embedding,
            metadata,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ChatRow {
    id: String,
    session_id: String,
    user_id: String,
    user_msg: String,
    ai_msg: String,
    created_at: String,
}

impl TryFrom<ChatRow> for ChatRecord {
    type Error = StoreError;

    fn try_from(row: ChatRow) -> StoreResult<Self> {
        Ok(Self {
            created_at: parse_timestamp(&row.created_at)?,
            id: row.id,
            session_id: row.session_id,
            user_id: row.user_id,
            user_msg: row.user_msg,
            ai_msg: row.ai_msg,
        })
    }
}
