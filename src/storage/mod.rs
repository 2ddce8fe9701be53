//! Key/value and relational persistence.
//!
//! [`KeyValueStore`] holds short-lived entries with a time-to-live (session
//! transcripts, the last-response cache). [`Repository`] keeps the durable
//! conversation log and completed 5-Why analyses. [`SqliteStorage`] implements
//! both, plus [`crate::vector::VectorStore`].

mod sqlite;

pub use sqlite::SqliteStorage;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::StoreResult;
use crate::pipeline::FiveWhySession;

/// Row count returned by history queries asking for zero or fewer rows.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// String store with per-entry expiry.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Set `key` to `value`, expiring after `ttl`. Overwrites.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Current value of `key`; `None` when absent or expired.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;
}

/// One persisted chat exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub user_msg: String,
    pub ai_msg: String,
    pub created_at: DateTime<Utc>,
}

/// Durable conversation and analysis log.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Append one exchange to the log. Empty session ids are rejected.
    async fn save_message(
        &self,
        session_id: &str,
        user_id: &str,
        user_msg: &str,
        ai_msg: &str,
    ) -> StoreResult<()>;

    /// Persist a completed 5-Why analysis.
    async fn save_five_why_session(&self, user_id: &str, session: &FiveWhySession)
        -> StoreResult<()>;

    /// Most recent exchanges of a session, newest first.
    ///
    /// A `limit` of zero or less means [`DEFAULT_HISTORY_LIMIT`].
    async fn get_session_history(&self, session_id: &str, limit: i32)
        -> StoreResult<Vec<ChatRecord>>;
}

/// Effective row count for a caller-supplied history limit.
pub fn history_limit(limit: i32) -> usize {
    if limit <= 0 {
        DEFAULT_HISTORY_LIMIT
    } else {
        limit as usize
    }
}

/// Process-local [`KeyValueStore`].
///
/// Expired entries are dropped lazily on the next write.
#[derive(Debug, Default)]
pub struct InMemoryKvStore {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl InMemoryKvStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKvStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        entries.insert(key.to_string(), (value.to_string(), now + ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(value, _)| value.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_kv_set_get_overwrite() {
        let store = InMemoryKvStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "v1", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v1".to_string()));

        store.set("k", "v2", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v2".to_string()));
    }

    #[tokio::test]
    async fn test_kv_zero_ttl_is_expired() {
        let store = InMemoryKvStore::new();
        store.set("k", "v", Duration::ZERO).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_kv_expired_entries_dropped_on_write() {
        let store = InMemoryKvStore::new();
        store.set("old", "v", Duration::ZERO).await.unwrap();
        store.set("new", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.entries.read().await.len(), 1);
    }

    #[test]
    fn test_history_limit() {
        assert_eq!(history_limit(0), 50);
        assert_eq!(history_limit(-1), 50);
        assert_eq!(history_limit(7), 7);
    }
}
