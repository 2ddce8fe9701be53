//! Integration tests for the 5-Why pipeline orchestrator

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockall::mock;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use causal_reasoning::embedding::HashingEmbedder;
use causal_reasoning::error::{
    AppError, BackendResult, GenerationError, PromptError, StoreError, StoreResult,
};
use causal_reasoning::generation::{
    BackendRequest, BackendResponse, GenerationBackend, ReasoningMode,
};
use causal_reasoning::pipeline::{
    CausalStep, Orchestrator, PipelineStage, RootCauseCategory, RootCauseResult,
};
use causal_reasoning::vector::{InMemoryVectorStore, VectorDocument, VectorStore};

use common::{engine_with, Harness, HangingBackend, ScriptedBackend, TEST_DIMENSION};

mock! {
    pub Vectors {}

    #[async_trait]
    impl VectorStore for Vectors {
        async fn init(&self) -> StoreResult<()>;
        async fn store(&self, document: VectorDocument) -> StoreResult<()>;
        async fn search(&self, vector: &[f32], limit: i32) -> StoreResult<Vec<VectorDocument>>;
        async fn delete(&self, id: &str) -> StoreResult<()>;
    }
}

/// Length of every output of [`FixedAnswerBackend`].
const FIXED_ANSWER_LEN: usize = 1600;

/// Back end that gives the same 1600-character answer to every free-text
/// stage and a prose-wrapped record, padded to the same length, to every
/// stage that asks for JSON.
struct FixedAnswerBackend {
    structured: String,
}

impl FixedAnswerBackend {
    fn new(record: &str) -> Self {
        Self {
            structured: pad_to(
                &format!("After reviewing the chain, one cause stands out. {} ", record),
                FIXED_ANSWER_LEN,
            ),
        }
    }

    fn answer() -> String {
        pad_to("Deploy jobs time out waiting on the network. ", FIXED_ANSWER_LEN)
    }
}

fn pad_to(text: &str, len: usize) -> String {
    let mut out = text.to_string();
    while out.len() < len {
        out.push('.');
    }
    out
}

#[async_trait]
impl GenerationBackend for FixedAnswerBackend {
    fn name(&self) -> &str {
        "primary"
    }

    async fn generate(&self, request: BackendRequest) -> BackendResult<BackendResponse> {
        let text = if request.prompt.contains("Your response MUST be valid JSON") {
            self.structured.clone()
        } else {
            Self::answer()
        };
        Ok(BackendResponse {
            tokens: text.split_whitespace().count() as u32,
            text,
            ..Default::default()
        })
    }
}

fn sample_steps() -> Vec<CausalStep> {
    (1..=5)
        .map(|level| CausalStep {
            level,
            question: format!("question {}", level),
            answer: format!("answer {}", level),
            analysis: format!("analysis {}", level),
        })
        .collect()
}

#[cfg(test)]
mod full_run_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_deploys_fail_intermittently() {
        let harness = Harness::new();
        let orchestrator = harness.orchestrator();
        let cancel = CancellationToken::new();

        let session = orchestrator
            .run_five_why("sess-1", "Deploys fail intermittently", &cancel)
            .await
            .unwrap();

        assert_eq!(session.session_id, "sess-1");

        // Five contiguous steps, the first asking the caller's question
        assert_eq!(session.steps.len(), 5);
        let levels: Vec<u8> = session.steps.iter().map(|s| s.level).collect();
        assert_eq!(levels, vec![1, 2, 3, 4, 5]);
        assert_eq!(session.steps[0].question, "Deploys fail intermittently");

        // Each later question is the previous iteration's next-why output
        for window in session.steps.windows(2) {
            assert!(window[1].question.starts_with("Why does cause"));
            assert_ne!(window[0].question, window[1].question);
        }

        assert_eq!(
            session.root_cause.root_cause,
            "No ownership of deploy pipeline configuration"
        );
        assert_eq!(session.root_cause.category, RootCauseCategory::Organizational);
        assert_eq!(session.root_cause.confidence, 0.82);
        assert_eq!(session.root_cause.evidence.len(), 2);

        assert_eq!(session.solution.owner, "platform team");
        assert_eq!(session.solution.automation, vec!["detect config drift nightly".to_string()]);
        assert_eq!(session.reframed.goal, "clear pipeline ownership");

        assert!(harness.sink.entries().is_empty());
    }

    #[tokio::test]
    async fn test_fixed_long_answers_score_top_confidence() {
        let backend = FixedAnswerBackend::new(
            r#"{"root_cause":"flaky network config","confidence":0.9,"evidence":["timeout logs"],"category":"technical","impact_scope":"deployment pipeline"}"#,
        );
        let orchestrator = Orchestrator::new(
            engine_with(Arc::new(backend)),
            Arc::new(InMemoryVectorStore::with_dimension(TEST_DIMENSION)),
            Arc::new(HashingEmbedder::new(TEST_DIMENSION)),
        );

        let session = orchestrator
            .run_five_why("sess-fixed", "Deploys fail intermittently", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(session.steps.len(), 5);
        assert_eq!(session.steps[0].question, "Deploys fail intermittently");
        assert!(session
            .steps
            .iter()
            .all(|s| s.answer == FixedAnswerBackend::answer()));

        assert_eq!(session.trace.len(), 18);
        for invocation in &session.trace {
            assert_eq!(invocation.confidence, 0.95, "stage {:?}", invocation.stage);
        }

        assert_eq!(session.root_cause.root_cause, "flaky network config");
        assert_eq!(session.root_cause.confidence, 0.9);
        assert_eq!(session.root_cause.evidence, vec!["timeout logs".to_string()]);
        assert_eq!(session.root_cause.category, RootCauseCategory::Technical);
        assert_eq!(session.root_cause.impact_scope, "deployment pipeline");
    }

    #[tokio::test]
    async fn test_trace_records_every_call() {
        let harness = Harness::new();
        let cancel = CancellationToken::new();

        let session = harness
            .orchestrator()
            .run_five_why("sess-trace", "Deploys fail intermittently", &cancel)
            .await
            .unwrap();

        assert_eq!(session.trace.len(), 18);
        assert_eq!(harness.backend.calls().len(), 18);

        let stages: Vec<PipelineStage> = session.trace.iter().map(|t| t.stage).collect();
        assert_eq!(
            &stages[..3],
            &[PipelineStage::Why, PipelineStage::Evaluation, PipelineStage::NextWhy]
        );
        assert_eq!(
            &stages[15..],
            &[PipelineStage::RootCause, PipelineStage::Solution, PipelineStage::Reframe]
        );
        assert_eq!(session.trace[14].level, Some(5));
        assert_eq!(session.trace[15].level, None);

        for invocation in &session.trace {
            assert_eq!(invocation.confidence, 0.95);
            assert_eq!(invocation.backend, "primary");
            assert_eq!(invocation.mode, invocation.stage.mode());
        }
        assert_eq!(session.trace[15].mode, ReasoningMode::Diagnosis);
        assert_eq!(session.trace[16].model, "planning-model");
    }

    #[tokio::test]
    async fn test_models_follow_stage_modes() {
        let harness = Harness::new();
        let cancel = CancellationToken::new();

        harness
            .orchestrator()
            .run_five_why("sess-models", "Deploys fail intermittently", &cancel)
            .await
            .unwrap();

        let models: Vec<String> = harness.backend.calls().into_iter().map(|c| c.model).collect();
        assert_eq!(&models[..3], &["reasoning-model", "analysis-model", "reasoning-model"]);
        assert_eq!(
            &models[15..],
            &["diagnosis-model", "planning-model", "reasoning-model"]
        );
    }

    #[tokio::test]
    async fn test_vector_documents_persisted() {
        let harness = Harness::new();
        let cancel = CancellationToken::new();

        harness
            .orchestrator()
            .run_five_why("sess-2", "Deploys fail intermittently", &cancel)
            .await
            .unwrap();

        assert_eq!(harness.vectors.len().await, 3);

        let question = harness.vectors.get("sess-2").await.unwrap();
        assert_eq!(question.content, "Deploys fail intermittently");
        assert_eq!(question.kind(), Some("question"));
        assert_eq!(question.embedding.len(), TEST_DIMENSION);

        let rca = harness.vectors.get("sess-2_rca").await.unwrap();
        assert_eq!(rca.content, "No ownership of deploy pipeline configuration");
        assert_eq!(rca.kind(), Some("root_cause"));

        let solution = harness.vectors.get("sess-2_solution").await.unwrap();
        assert_eq!(solution.kind(), Some("solution"));
        assert!(solution.content.contains("\"owner\":\"platform team\""));
        assert!(solution.content.starts_with("Plan follows."));
    }

    #[tokio::test]
    async fn test_empty_session_id_is_generated() {
        let harness = Harness::new();
        let cancel = CancellationToken::new();

        let session = harness
            .orchestrator()
            .run_five_why("", "Deploys fail intermittently", &cancel)
            .await
            .unwrap();

        assert!(!session.session_id.is_empty());
        assert!(harness.vectors.get(&session.session_id).await.is_some());
    }

    #[tokio::test]
    async fn test_same_session_id_overwrites_documents() {
        let harness = Harness::new();
        let orchestrator = harness.orchestrator();
        let cancel = CancellationToken::new();

        orchestrator
            .run_five_why("dup", "First question", &cancel)
            .await
            .unwrap();
        orchestrator
            .run_five_why("dup", "Second question", &cancel)
            .await
            .unwrap();

        assert_eq!(harness.vectors.len().await, 3);
        assert_eq!(harness.vectors.get("dup").await.unwrap().content, "Second question");
    }
}

#[cfg(test)]
mod failure_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_empty_question_rejected_without_calls() {
        let harness = Harness::new();
        let cancel = CancellationToken::new();

        let err = harness
            .orchestrator()
            .run_five_why("s", "   ", &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidRequest { .. }));
        assert!(harness.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_mid_loop_returns_no_session() {
        let harness = Harness::with_backend(ScriptedBackend::new().failing_on_call(7));
        let cancel = CancellationToken::new();

        let err = harness
            .orchestrator()
            .run_five_why("s", "Deploys fail intermittently", &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Generation(GenerationError::Backend(_))));
        assert_eq!(harness.backend.calls().len(), 7);
        assert!(harness.vectors.is_empty().await);
    }

    #[tokio::test]
    async fn test_malformed_root_cause_aborts_run() {
        let harness = Harness::with_backend(
            ScriptedBackend::new().with_root_cause_output("I could not decide on a root cause."),
        );
        let cancel = CancellationToken::new();

        let err = harness
            .orchestrator()
            .run_five_why("s", "Deploys fail intermittently", &cancel)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Prompt(PromptError::MalformedModelOutput { .. })
        ));
        // Solution and reframe never ran
        assert_eq!(harness.backend.calls().len(), 16);
        assert!(harness.vectors.is_empty().await);
    }

    #[tokio::test]
    async fn test_stray_brace_in_prose_is_rejected() {
        let raw = format!(
            "Consider {{ the options. {}",
            common::ROOT_CAUSE_JSON
        );
        let harness = Harness::with_backend(ScriptedBackend::new().with_root_cause_output(raw));
        let cancel = CancellationToken::new();

        let err = harness
            .orchestrator()
            .run_five_why("s", "Deploys fail intermittently", &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Prompt(_)));
    }

    #[tokio::test]
    async fn test_unregistered_backend() {
        let harness = Harness::new();
        let orchestrator = Orchestrator::new(
            Arc::new(causal_reasoning::generation::GenerationEngine::new()),
            harness.vectors.clone(),
            harness.embedder.clone(),
        );
        let cancel = CancellationToken::new();

        let err = orchestrator
            .run_five_why("s", "Deploys fail intermittently", &cancel)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Generation(GenerationError::BackendNotRegistered { ref name }) if name == "primary"
        ));
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_change_result() {
        let harness = Harness::new();
        let mut vectors = MockVectors::new();
        vectors
            .expect_store()
            .times(3)
            .returning(|_| Err(StoreError::Query {
                message: "disk full".to_string(),
            }));

        let orchestrator = Orchestrator::new(
            harness.generation.clone(),
            Arc::new(vectors),
            harness.embedder.clone(),
        )
        .with_sink(Arc::new(harness.sink.clone()));
        let cancel = CancellationToken::new();

        let session = orchestrator
            .run_five_why("s", "Deploys fail intermittently", &cancel)
            .await
            .unwrap();

        assert_eq!(session.steps.len(), 5);
        assert_eq!(
            harness.sink.operations(),
            vec!["pipeline.persist"; 3]
        );
        assert!(harness.sink.entries()[0].1.contains("disk full"));
    }
}

#[cfg(test)]
mod cancellation_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_cancel_before_start() {
        let harness = Harness::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = harness
            .orchestrator()
            .run_five_why("s", "Deploys fail intermittently", &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(harness.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_hanging_call() {
        let harness = Harness::new();
        let orchestrator = Orchestrator::new(
            engine_with(Arc::new(HangingBackend)),
            harness.vectors.clone(),
            harness.embedder.clone(),
        );
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            orchestrator.run_five_why("s", "Deploys fail intermittently", &cancel),
        )
        .await
        .expect("run should stop once cancelled");

        assert!(result.unwrap_err().is_cancelled());
        assert!(harness.vectors.is_empty().await);
    }
}

#[cfg(test)]
mod reduced_entry_point_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_extract_root_cause_single_call() {
        let harness = Harness::new();
        let cancel = CancellationToken::new();

        let root_cause = harness
            .orchestrator()
            .extract_root_cause(&sample_steps(), &cancel)
            .await
            .unwrap();

        assert_eq!(root_cause.category, RootCauseCategory::Organizational);

        let calls = harness.backend.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "diagnosis-model");
        assert!(calls[0].prompt.contains("WHY 3:\nQ: question 3\nA: answer 3\nANALYSIS: analysis 3"));
        assert!(harness.vectors.is_empty().await);
    }

    #[tokio::test]
    async fn test_reframe_question_single_call() {
        let harness = Harness::new();
        let cancel = CancellationToken::new();
        let root_cause = RootCauseResult {
            root_cause: "No ownership".to_string(),
            confidence: 0.5,
            evidence: vec![],
            category: RootCauseCategory::Organizational,
            impact_scope: String::new(),
        };

        let reframed = harness
            .orchestrator()
            .reframe_question("Deploys fail intermittently", &root_cause, &cancel)
            .await
            .unwrap();

        assert_eq!(reframed.original, "Deploys fail intermittently");
        let calls = harness.backend.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].prompt.contains("\"No ownership\""));
        assert!(harness.vectors.is_empty().await);
    }
}
