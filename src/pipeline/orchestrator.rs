use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    CausalStep, FiveWhySession, PipelineStage, ReframedQuestion, RootCauseResult,
    StageInvocation, WHY_DEPTH,
};
use crate::cancel::cancellable;
use crate::embedding::Embedder;
use crate::error::{AppError, AppResult, MemoryError, MemoryResult};
use crate::generation::{GenerationEngine, GenerationRequest};
use crate::prompts::{PromptBuilder, TemplateBuilder};
use crate::side_effects::{FailureSink, TracingSink};
use crate::vector::{VectorDocument, VectorStore};

/// Drives the 5-Why pipeline over a [`GenerationEngine`].
///
/// A run is a strictly sequential chain of generation calls: five WHY
/// iterations (question, evaluation, next question), then root-cause
/// extraction, solution synthesis and reframing. Any generation or parse
/// failure aborts the run. Once every stage has succeeded, the question,
/// root cause and solution are embedded and written to the vector store on
/// a best-effort basis.
pub struct Orchestrator {
    generation: Arc<GenerationEngine>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    prompts: Arc<dyn PromptBuilder>,
    sink: Arc<dyn FailureSink>,
}

impl Orchestrator {
    /// Create an orchestrator with the built-in templates and a logging sink.
    pub fn new(
        generation: Arc<GenerationEngine>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            generation,
            vectors,
            embedder,
            prompts: Arc::new(TemplateBuilder::new()),
            sink: Arc::new(TracingSink),
        }
    }

    /// Replace the prompt builder.
    pub fn with_prompts(mut self, prompts: Arc<dyn PromptBuilder>) -> Self {
        self.prompts = prompts;
        self
    }

    /// Route persistence failures to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Run the full 5-Why analysis of `question`.
    ///
    /// An empty `session_id` is replaced by a generated one. On failure no
    /// session is returned and nothing is persisted.
    pub async fn run_five_why(
        &self,
        session_id: &str,
        question: &str,
        cancel: &CancellationToken,
    ) -> AppResult<FiveWhySession> {
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
        let created_at = Utc::now();

        info!(session_id = %session_id, "Starting 5-Why analysis");

        let mut trace = Vec::with_capacity(WHY_DEPTH as usize * 3 + 3);
        let mut steps = Vec::with_capacity(WHY_DEPTH as usize);
        let mut current = question.to_string();

        for level in 1..=WHY_DEPTH {
            let answer = self
                .stage(
                    PipelineStage::Why,
                    Some(level),
                    self.prompts.build_five_why_prompt(level, &current),
                    &mut trace,
                    cancel,
                )
                .await?;

            let analysis = self
                .stage(
                    PipelineStage::Evaluation,
                    Some(level),
                    self.prompts.build_evaluation_prompt(&current, &answer),
                    &mut trace,
                    cancel,
                )
                .await?;

            let next = self
                .stage(
                    PipelineStage::NextWhy,
                    Some(level),
                    self.prompts.build_next_why_prompt(&answer),
                    &mut trace,
                    cancel,
                )
                .await?;

            steps.push(CausalStep {
                level,
                question: std::mem::replace(&mut current, next),
                answer,
                analysis,
            });

            debug!(session_id = %session_id, level, "WHY iteration complete");
        }

        let root_cause = self.root_cause_stage(&steps, &mut trace, cancel).await?;

        let solution_text = self
            .stage(
                PipelineStage::Solution,
                None,
                self.prompts.build_solution_prompt(&root_cause, &steps),
                &mut trace,
                cancel,
            )
            .await?;
        let solution = self.prompts.parse_solution(&solution_text)?;

        let reframed = self
            .reframe_stage(question, &root_cause, &mut trace, cancel)
            .await?;

        let documents = [
            (session_id.clone(), question.to_string(), "question"),
            (
                format!("{}_rca", session_id),
                root_cause.root_cause.clone(),
                "root_cause",
            ),
            (
                format!("{}_solution", session_id),
                solution_text,
                "solution",
            ),
        ];

        for (id, content, kind) in documents {
            match self.persist(&session_id, id, content, kind, cancel).await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => return Err(e.into()),
                Err(e) => self.sink.discarded("pipeline.persist", &e),
            }
        }

        info!(
            session_id = %session_id,
            category = %root_cause.category,
            calls = trace.len(),
            tokens = trace.iter().map(|t| u64::from(t.tokens)).sum::<u64>(),
            "5-Why analysis complete"
        );

        Ok(FiveWhySession {
            session_id,
            steps,
            root_cause,
            solution,
            reframed,
            created_at,
            trace,
        })
    }

    /// Extract a root cause from an existing chain, without persisting it.
    pub async fn extract_root_cause(
        &self,
        steps: &[CausalStep],
        cancel: &CancellationToken,
    ) -> AppResult<RootCauseResult> {
        let mut trace = Vec::with_capacity(1);
        self.root_cause_stage(steps, &mut trace, cancel).await
    }

    /// Restate `question` against a known root cause, without persisting it.
    pub async fn reframe_question(
        &self,
        question: &str,
        root_cause: &RootCauseResult,
        cancel: &CancellationToken,
    ) -> AppResult<ReframedQuestion> {
        let mut trace = Vec::with_capacity(1);
        self.reframe_stage(question, root_cause, &mut trace, cancel)
            .await
    }

    async fn root_cause_stage(
        &self,
        steps: &[CausalStep],
        trace: &mut Vec<StageInvocation>,
        cancel: &CancellationToken,
    ) -> AppResult<RootCauseResult> {
        let raw = self
            .stage(
                PipelineStage::RootCause,
                None,
                self.prompts.build_root_cause_prompt(steps),
                trace,
                cancel,
            )
            .await?;

        self.prompts.parse_root_cause(&raw).map_err(|e| {
            warn!(error = %e, "Root cause output could not be parsed");
            AppError::from(e)
        })
    }

    async fn reframe_stage(
        &self,
        question: &str,
        root_cause: &RootCauseResult,
        trace: &mut Vec<StageInvocation>,
        cancel: &CancellationToken,
    ) -> AppResult<ReframedQuestion> {
        let raw = self
            .stage(
                PipelineStage::Reframe,
                None,
                self.prompts.build_reframe_prompt(question, root_cause),
                trace,
                cancel,
            )
            .await?;

        Ok(self.prompts.parse_reframe(&raw)?)
    }

    /// One generation call, recorded in `trace`.
    async fn stage(
        &self,
        stage: PipelineStage,
        level: Option<u8>,
        prompt: String,
        trace: &mut Vec<StageInvocation>,
        cancel: &CancellationToken,
    ) -> AppResult<String> {
        let response = self
            .generation
            .generate(GenerationRequest::new(stage.mode(), prompt), cancel)
            .await?;

        trace.push(StageInvocation::from_response(stage, level, &response));
        Ok(response.text)
    }

    async fn persist(
        &self,
        session_id: &str,
        id: String,
        content: String,
        kind: &str,
        cancel: &CancellationToken,
    ) -> MemoryResult<()> {
        let embedding = cancellable(cancel, async {
            self.embedder.embed(&content).await.map_err(MemoryError::from)
        })
        .await?;

        let document = VectorDocument::new(id, content, embedding)
            .with_metadata("type", kind)
            .with_metadata("session_id", session_id);

        cancellable(cancel, self.vectors.store(document)).await?;
        Ok(())
    }
}
