//! Conversational facade over the pipeline and memory.
//!
//! [`ChatService`] gates the analysis features behind [`FeatureConfig`]
//! flags and performs the side effects a conversation needs: transcript
//! appends, the last-response cache and the durable repository log. Those
//! side effects are best-effort and report failures to the failure sink.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cancel::cancellable;
use crate::config::FeatureConfig;
use crate::error::{AppError, AppResult};
use crate::generation::{GenerationEngine, GenerationRequest, GenerationResponse, ReasoningMode};
use crate::memory::{MemoryEngine, RetrievedMemory, Role};
use crate::pipeline::{CausalStep, FiveWhySession, Orchestrator, ReframedQuestion, RootCauseResult};
use crate::side_effects::{FailureSink, TracingSink};
use crate::storage::{ChatRecord, KeyValueStore, Repository};

/// Cache key holding the most recent chat reply.
pub const LAST_RESPONSE_KEY: &str = "llm:last_response";

/// Lifetime of the last-response cache entry.
pub const LAST_RESPONSE_TTL: Duration = Duration::from_secs(30 * 60);

/// Number of recalled documents mixed into chat context.
pub const CHAT_CONTEXT_LIMIT: i32 = 5;

/// Feature-gated entry point for chat and causal analysis.
pub struct ChatService {
    generation: Arc<GenerationEngine>,
    orchestrator: Arc<Orchestrator>,
    memory: Arc<MemoryEngine>,
    cache: Arc<dyn KeyValueStore>,
    repository: Option<Arc<dyn Repository>>,
    features: FeatureConfig,
    sink: Arc<dyn FailureSink>,
}

impl ChatService {
    /// Create a service without a repository.
    pub fn new(
        generation: Arc<GenerationEngine>,
        orchestrator: Arc<Orchestrator>,
        memory: Arc<MemoryEngine>,
        cache: Arc<dyn KeyValueStore>,
        features: FeatureConfig,
    ) -> Self {
        Self {
            generation,
            orchestrator,
            memory,
            cache,
            repository: None,
            features,
            sink: Arc::new(TracingSink),
        }
    }

    /// Log exchanges and analyses to `repository`.
    pub fn with_repository(mut self, repository: Arc<dyn Repository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Route discarded failures to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Enabled features
    pub fn features(&self) -> &FeatureConfig {
        &self.features
    }

    /// Memory engine backing this service
    pub fn memory(&self) -> &Arc<MemoryEngine> {
        &self.memory
    }

    /// Answer `message` with the session transcript and recalled memory as context.
    pub async fn chat(
        &self,
        session_id: &str,
        user_id: &str,
        message: &str,
        cancel: &CancellationToken,
    ) -> AppResult<GenerationResponse> {
        if message.trim().is_empty() {
            return Err(AppError::InvalidRequest {
                message: "message cannot be empty".to_string(),
            });
        }

        self.remember(session_id, Role::User, message, cancel).await?;

        let context = self
            .memory
            .hybrid_context(session_id, message, CHAT_CONTEXT_LIMIT, cancel)
            .await;
        let prompt = format!("Context:\n{}\nUser:\n{}", context, message);

        let response = self
            .generation
            .generate(GenerationRequest::new(ReasoningMode::Reasoning, prompt), cancel)
            .await?;

        match cancellable(
            cancel,
            self.cache
                .set(LAST_RESPONSE_KEY, &response.text, LAST_RESPONSE_TTL),
        )
        .await
        {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => return Err(e.into()),
            Err(e) => self.sink.discarded("service.cache_last_response", &e),
        }

        self.remember(session_id, Role::Assistant, &response.text, cancel)
            .await?;

        if let Some(repository) = &self.repository {
            let saved = cancellable(
                cancel,
                repository.save_message(session_id, user_id, message, &response.text),
            )
            .await;
            match saved {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => return Err(e.into()),
                Err(e) => self.sink.discarded("service.save_message", &e),
            }
        }

        debug!(
            session_id = %session_id,
            tokens = response.tokens,
            latency_ms = response.latency.as_millis(),
            "Chat reply generated"
        );
        Ok(response)
    }

    /// Most recent chat reply, if still cached.
    pub async fn last_response(&self, cancel: &CancellationToken) -> AppResult<Option<String>> {
        Ok(cancellable(cancel, self.cache.get(LAST_RESPONSE_KEY)).await?)
    }

    /// Run a full 5-Why analysis within a conversation.
    ///
    /// The question and the extracted root cause are appended to the
    /// session transcript, and the finished analysis is logged to the
    /// repository. An empty `session_id` is replaced by a generated one.
    pub async fn five_why(
        &self,
        session_id: &str,
        user_id: &str,
        question: &str,
        cancel: &CancellationToken,
    ) -> AppResult<FiveWhySession> {
        if !self.features.five_why {
            return Err(AppError::Disabled {
                feature: "five_why".to_string(),
            });
        }
        if question.trim().is_empty() {
            return Err(AppError::InvalidRequest {
                message: "question cannot be empty".to_string(),
            });
        }

        let session_id = if session_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            session_id.to_string()
        };

        self.remember(&session_id, Role::User, question, cancel)
            .await?;

        let session = self
            .orchestrator
            .run_five_why(&session_id, question, cancel)
            .await?;

        self.remember(
            &session_id,
            Role::Assistant,
            &session.root_cause.root_cause,
            cancel,
        )
        .await?;

        if let Some(repository) = &self.repository {
            let saved = cancellable(cancel, repository.save_five_why_session(user_id, &session)).await;
            match saved {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => return Err(e.into()),
                Err(e) => self.sink.discarded("service.save_five_why_session", &e),
            }
        }

        info!(
            session_id = %session.session_id,
            category = %session.root_cause.category,
            "5-Why analysis delivered"
        );
        Ok(session)
    }

    /// Extract a root cause from a caller-supplied chain.
    pub async fn root_cause(
        &self,
        steps: &[CausalStep],
        cancel: &CancellationToken,
    ) -> AppResult<RootCauseResult> {
        if !self.features.root_cause {
            return Err(AppError::Disabled {
                feature: "root_cause".to_string(),
            });
        }
        self.orchestrator.extract_root_cause(steps, cancel).await
    }

    /// Reframe a question against a known root cause.
    pub async fn reframe(
        &self,
        question: &str,
        root_cause: &RootCauseResult,
        cancel: &CancellationToken,
    ) -> AppResult<ReframedQuestion> {
        if !self.features.reframe {
            return Err(AppError::Disabled {
                feature: "reframe".to_string(),
            });
        }
        self.orchestrator
            .reframe_question(question, root_cause, cancel)
            .await
    }

    /// Semantic search over long-term memory.
    pub async fn recall(
        &self,
        query: &str,
        limit: i32,
        cancel: &CancellationToken,
    ) -> AppResult<RetrievedMemory> {
        Ok(self.memory.recall(query, limit, cancel).await?)
    }

    /// Summarize a session into long-term memory and return the summary.
    pub async fn compress_session(
        &self,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> AppResult<String> {
        Ok(self.memory.compress_session(session_id, cancel).await?)
    }

    /// Compress a session on a background task.
    ///
    /// Failures are reported to the failure sink; cancellation is not a
    /// failure. Await the handle to know when the task has finished.
    pub fn spawn_compression(&self, session_id: &str, cancel: CancellationToken) -> JoinHandle<()> {
        let memory = Arc::clone(&self.memory);
        let sink = Arc::clone(&self.sink);
        let session_id = session_id.to_string();

        tokio::spawn(async move {
            match memory.compress_session(&session_id, &cancel).await {
                Ok(summary) => {
                    debug!(session_id = %session_id, summary_chars = summary.len(), "Background compression finished")
                }
                Err(e) if e.is_cancelled() => {
                    debug!(session_id = %session_id, "Background compression cancelled")
                }
                Err(e) => sink.discarded("service.background_compression", &e),
            }
        })
    }

    /// Most recent logged exchanges of a session, newest first.
    pub async fn history(
        &self,
        session_id: &str,
        limit: i32,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<ChatRecord>> {
        let repository = self.repository.as_ref().ok_or_else(|| AppError::Config {
            message: "no repository configured".to_string(),
        })?;

        Ok(cancellable(cancel, repository.get_session_history(session_id, limit)).await?)
    }

    /// Best-effort transcript append; only cancellation escapes.
    async fn remember(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        match self
            .memory
            .append_session(session_id, role, content, cancel)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_cancelled() => Err(e.into()),
            Err(e) => {
                self.sink.discarded("service.append_session", &e);
                Ok(())
            }
        }
    }
}
