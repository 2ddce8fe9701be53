//! Session and semantic memory.
//!
//! Short-term memory is a per-session transcript kept in a
//! [`KeyValueStore`] with a rolling 24 hour expiry. Long-term memory is a
//! set of embedded documents in a [`VectorStore`]. The [`MemoryEngine`]
//! combines both into prompt context and compresses transcripts into
//! long-term summaries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cancel::cancellable;
use crate::embedding::Embedder;
use crate::error::{MemoryError, MemoryResult};
use crate::generation::{GenerationEngine, GenerationRequest, ReasoningMode};
use crate::prompts::build_memory_summary_prompt;
use crate::side_effects::{observe, FailureSink, TracingSink};
use crate::storage::KeyValueStore;
use crate::vector::{VectorDocument, VectorStore};

/// Expiry applied to a session transcript on every append.
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Key prefix of session transcripts in the key/value store.
pub const SESSION_KEY_PREFIX: &str = "session:";

/// Separator between transcript and recalled documents in hybrid context.
pub const SEMANTIC_MEMORY_HEADER: &str = "\n--- Semantic Memory ---\n";

/// Speaker of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Get the role name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl MemoryMessage {
    /// Create a message stamped with the current time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A session transcript as stored in the key/value store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMemory {
    pub session_id: String,
    #[serde(default)]
    pub messages: Vec<MemoryMessage>,
    pub updated_at: DateTime<Utc>,
}

impl SessionMemory {
    /// Create an empty transcript.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Render as `role: content` lines, each newline-terminated.
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}\n", m.role, m.content))
            .collect()
    }
}

/// Documents recalled for a query, with their contents joined as context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedMemory {
    pub documents: Vec<VectorDocument>,
    pub context: String,
}

fn session_key(session_id: &str) -> String {
    format!("{}{}", SESSION_KEY_PREFIX, session_id)
}

/// Short-term transcripts plus long-term semantic recall.
pub struct MemoryEngine {
    kv: Arc<dyn KeyValueStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    generation: Arc<GenerationEngine>,
    sink: Arc<dyn FailureSink>,
}

impl MemoryEngine {
    /// Create a memory engine that logs discarded failures.
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        generation: Arc<GenerationEngine>,
    ) -> Self {
        Self {
            kv,
            vectors,
            embedder,
            generation,
            sink: Arc::new(TracingSink),
        }
    }

    /// Route discarded failures to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Append a message to a session transcript and refresh its expiry.
    ///
    /// Load, decode, encode and write failures are reported to the failure
    /// sink and otherwise ignored; a corrupt transcript is replaced by a
    /// fresh one. Concurrent appends to one session may lose messages.
    pub async fn append_session(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
        cancel: &CancellationToken,
    ) -> MemoryResult<()> {
        if session_id.is_empty() {
            return Err(MemoryError::MissingSessionId);
        }

        let key = session_key(session_id);

        let existing = match cancellable(cancel, self.kv.get(&key)).await {
            Ok(value) => value,
            Err(e) if e.is_cancelled() => return Err(e.into()),
            Err(e) => {
                self.sink.discarded("memory.append_session.load", &e);
                None
            }
        };

        let mut session = existing
            .filter(|raw| !raw.is_empty())
            .and_then(|raw| match serde_json::from_str::<SessionMemory>(&raw) {
                Ok(session) => Some(session),
                Err(e) => {
                    let err = MemoryError::Corrupt {
                        message: e.to_string(),
                    };
                    self.sink.discarded("memory.append_session.decode", &err);
                    None
                }
            })
            .unwrap_or_else(|| SessionMemory::new(session_id));

        session.session_id = session_id.to_string();
        session.messages.push(MemoryMessage::new(role, content));
        session.updated_at = Utc::now();

        let Some(encoded) = observe(
            self.sink.as_ref(),
            "memory.append_session.encode",
            serde_json::to_string(&session),
        ) else {
            return Ok(());
        };

        match cancellable(cancel, self.kv.set(&key, &encoded, SESSION_TTL)).await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => return Err(e.into()),
            Err(e) => self.sink.discarded("memory.append_session.store", &e),
        }

        debug!(
            session_id = %session_id,
            role = %role,
            messages = session.messages.len(),
            "Appended session message"
        );
        Ok(())
    }

    /// Load a session transcript.
    pub async fn get_session(
        &self,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> MemoryResult<SessionMemory> {
        let raw = cancellable(cancel, self.kv.get(&session_key(session_id)))
            .await?
            .filter(|raw| !raw.is_empty())
            .ok_or_else(|| MemoryError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;

        serde_json::from_str(&raw).map_err(|e| MemoryError::Corrupt {
            message: e.to_string(),
        })
    }

    /// Semantic search over long-term memory.
    ///
    /// A `limit` of zero or less returns the store's default count.
    pub async fn recall(
        &self,
        query: &str,
        limit: i32,
        cancel: &CancellationToken,
    ) -> MemoryResult<RetrievedMemory> {
        if query.trim().is_empty() {
            return Err(MemoryError::EmptyQuery);
        }

        let embedding = cancellable(cancel, async {
            self.embedder.embed(query).await.map_err(MemoryError::from)
        })
        .await?;

        let documents = cancellable(cancel, self.vectors.search(&embedding, limit)).await?;

        let context = documents
            .iter()
            .map(|d| format!("{}\n", d.content))
            .collect();

        debug!(results = documents.len(), "Recalled semantic memory");
        Ok(RetrievedMemory { documents, context })
    }

    /// Transcript of the session followed by recalled documents.
    ///
    /// Never fails: a missing transcript or a failed recall just leaves its
    /// section out.
    pub async fn hybrid_context(
        &self,
        session_id: &str,
        query: &str,
        limit: i32,
        cancel: &CancellationToken,
    ) -> String {
        let mut context = String::new();

        match self.get_session(session_id, cancel).await {
            Ok(session) => context.push_str(&session.transcript()),
            Err(e) => debug!(session_id = %session_id, error = %e, "No session transcript for context"),
        }

        match self.recall(query, limit, cancel).await {
            Ok(recalled) => {
                context.push_str(SEMANTIC_MEMORY_HEADER);
                context.push_str(&recalled.context);
            }
            Err(e) => debug!(error = %e, "No semantic memory for context"),
        }

        context
    }

    /// Summarize a session transcript into long-term memory.
    ///
    /// The summary is stored as `<session_id>_summary`, replacing any earlier
    /// summary of the same session, and returned.
    pub async fn compress_session(
        &self,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> MemoryResult<String> {
        let session = self.get_session(session_id, cancel).await?;
        let prompt = build_memory_summary_prompt(&session.messages);

        let response = self
            .generation
            .generate(GenerationRequest::new(ReasoningMode::Analysis, prompt), cancel)
            .await?;

        let embedding = cancellable(cancel, async {
            self.embedder
                .embed(&response.text)
                .await
                .map_err(MemoryError::from)
        })
        .await?;

        let document = VectorDocument::new(
            format!("{}_summary", session_id),
            response.text.clone(),
            embedding,
        )
        .with_metadata("type", "session_summary")
        .with_metadata("session_id", session_id);

        cancellable(cancel, self.vectors.store(document)).await?;

        info!(
            session_id = %session_id,
            messages = session.messages.len(),
            summary_chars = response.text.len(),
            "Compressed session into long-term memory"
        );
        Ok(response.text)
    }

    /// Embed and store arbitrary content under a fresh id, returned.
    pub async fn store_long_term(
        &self,
        content: &str,
        metadata: HashMap<String, String>,
        cancel: &CancellationToken,
    ) -> MemoryResult<String> {
        let embedding = cancellable(cancel, async {
            self.embedder.embed(content).await.map_err(MemoryError::from)
        })
        .await?;

        let id = Uuid::new_v4().to_string();
        let document = VectorDocument {
            id: id.clone(),
            content: content.to_string(),
            embedding,
            metadata,
        };

        cancellable(cancel, self.vectors.store(document)).await?;

        debug!(id = %id, "Stored long-term memory");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&MemoryMessage::new(Role::Assistant, "hi")).unwrap();
        assert!(json.contains("\"role\":\"assistant\""));
        assert_eq!("USER".parse::<Role>(), Ok(Role::User));
        assert!("system".parse::<Role>().is_err());
    }

    #[test]
    fn test_transcript_lines() {
        let mut session = SessionMemory::new("s1");
        session.messages.push(MemoryMessage::new(Role::User, "why?"));
        session.messages.push(MemoryMessage::new(Role::Assistant, "because"));
        assert_eq!(session.transcript(), "user: why?\nassistant: because\n");
    }

    #[test]
    fn test_session_key() {
        assert_eq!(session_key("abc"), "session:abc");
    }
}
