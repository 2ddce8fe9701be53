//! Shared test fixtures: scripted back ends and wired engines.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use causal_reasoning::embedding::HashingEmbedder;
use causal_reasoning::error::{BackendError, BackendResult};
use causal_reasoning::generation::{
    BackendRequest, BackendResponse, GenerationBackend, GenerationEngine,
};
use causal_reasoning::memory::MemoryEngine;
use causal_reasoning::pipeline::Orchestrator;
use causal_reasoning::side_effects::RecordingSink;
use causal_reasoning::storage::InMemoryKvStore;
use causal_reasoning::vector::InMemoryVectorStore;

/// Embedding width used by test fixtures.
pub const TEST_DIMENSION: usize = 64;

/// Prose appended to every scripted output so it scores the top confidence band.
pub fn padding() -> String {
    "Additional supporting context for the causal chain. ".repeat(32)
}

pub const ROOT_CAUSE_JSON: &str = r#"{"root_cause":"No ownership of deploy pipeline configuration","confidence":0.82,"evidence":["config drift between runners","no review of pipeline changes"],"category":"Organizational","impact_scope":"all production releases"}"#;

pub const SOLUTION_JSON: &str = r#"{"immediate_actions":["pin runner images"],"strategic_actions":["assign a pipeline owner"],"preventive_actions":["review pipeline changes"],"automation_opportunities":["detect config drift nightly"],"owner":"platform team","complexity":"medium","time_horizon":"one quarter"}"#;

pub const REFRAME_JSON: &str = r#"{"original":"Deploys fail intermittently","reframed":"Who owns the deploy pipeline configuration and how is drift prevented?","intent":"stable releases","goal":"clear pipeline ownership"}"#;

pub const SUMMARY_TEXT: &str = "Summary: the user investigated intermittent deploy failures.";

/// Back end that answers each pipeline stage with canned, well-formed output.
///
/// Stages are recognised by the opening line of the rendered template.
/// Free-text stages echo the call number so answers are distinguishable.
pub struct ScriptedBackend {
    name: String,
    root_cause_output: Option<String>,
    fail_on_call: Option<usize>,
    calls: Mutex<Vec<BackendRequest>>,
    counter: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            name: "primary".to_string(),
            root_cause_output: None,
            fail_on_call: None,
            calls: Mutex::new(Vec::new()),
            counter: AtomicUsize::new(0),
        }
    }

    /// Replace the root-cause stage output verbatim.
    pub fn with_root_cause_output(mut self, raw: impl Into<String>) -> Self {
        self.root_cause_output = Some(raw.into());
        self
    }

    /// Fail the `n`th call (1-based) with a back-end error.
    pub fn failing_on_call(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    pub fn calls(&self) -> Vec<BackendRequest> {
        self.calls.lock().unwrap().clone()
    }

    fn respond(&self, call: usize, prompt: &str) -> String {
        let pad = padding();
        if prompt.starts_with("You are a root-cause analysis system.") {
            match &self.root_cause_output {
                Some(raw) => raw.clone(),
                None => format!("Here is the diagnosis.\n{}\n{}", ROOT_CAUSE_JSON, pad),
            }
        } else if prompt.starts_with("You are a solution engineering assistant.") {
            format!("Plan follows.\n{}\n{}", SOLUTION_JSON, pad)
        } else if prompt.starts_with("You are a cognitive reframing assistant.") {
            format!("Reframed.\n{}\n{}", REFRAME_JSON, pad)
        } else if prompt.starts_with("You are a memory compression assistant.") {
            SUMMARY_TEXT.to_string()
        } else if prompt.starts_with("You are an analytical evaluator.") {
            format!("Analysis {}: the answer is causal and specific. {}", call, pad)
        } else if prompt.starts_with("You are a causal reasoning engine.") {
            format!("Why does cause {} occur? {}", call, pad)
        } else if prompt.starts_with("You are a diagnostic assistant") {
            format!("Because of factor {}. {}", call, pad)
        } else {
            format!("Reply to chat. {}", pad)
        }
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: BackendRequest) -> BackendResult<BackendResponse> {
        let call = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls.lock().unwrap().push(request.clone());

        if self.fail_on_call == Some(call) {
            return Err(BackendError::Failed {
                message: format!("scripted failure on call {}", call),
            });
        }

        let text = self.respond(call, &request.prompt);
        Ok(BackendResponse {
            tokens: text.split_whitespace().count() as u32,
            text,
            model: String::new(),
            metadata: Default::default(),
        })
    }
}

/// Back end whose calls never complete.
pub struct HangingBackend;

#[async_trait]
impl GenerationBackend for HangingBackend {
    fn name(&self) -> &str {
        "primary"
    }

    async fn generate(&self, _request: BackendRequest) -> BackendResult<BackendResponse> {
        std::future::pending().await
    }
}

/// Engine with `backend` registered under its own name and default routing.
pub fn engine_with(backend: Arc<dyn GenerationBackend>) -> Arc<GenerationEngine> {
    let mut engine = GenerationEngine::new();
    engine.register_backend(backend);
    Arc::new(engine)
}

/// In-memory stores, a scripted back end and a recording sink, wired together.
pub struct Harness {
    pub backend: Arc<ScriptedBackend>,
    pub generation: Arc<GenerationEngine>,
    pub vectors: Arc<InMemoryVectorStore>,
    pub kv: Arc<InMemoryKvStore>,
    pub embedder: Arc<HashingEmbedder>,
    pub sink: RecordingSink,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_backend(ScriptedBackend::new())
    }

    pub fn with_backend(backend: ScriptedBackend) -> Self {
        let backend = Arc::new(backend);
        Self {
            generation: engine_with(backend.clone()),
            backend,
            vectors: Arc::new(InMemoryVectorStore::with_dimension(TEST_DIMENSION)),
            kv: Arc::new(InMemoryKvStore::new()),
            embedder: Arc::new(HashingEmbedder::new(TEST_DIMENSION)),
            sink: RecordingSink::new(),
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.generation.clone(),
            self.vectors.clone(),
            self.embedder.clone(),
        )
        .with_sink(Arc::new(self.sink.clone()))
    }

    pub fn memory(&self) -> MemoryEngine {
        MemoryEngine::new(
            self.kv.clone(),
            self.vectors.clone(),
            self.embedder.clone(),
            self.generation.clone(),
        )
        .with_sink(Arc::new(self.sink.clone()))
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
