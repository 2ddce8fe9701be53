//! 5-Why pipeline records and orchestration.
//!
//! The [`Orchestrator`] drives a fixed sequence of generation calls and
//! produces an immutable [`FiveWhySession`].

mod orchestrator;

pub use orchestrator::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::generation::{GenerationResponse, ReasoningMode};

/// Number of WHY iterations in every run.
pub const WHY_DEPTH: u8 = 5;

/// One WHY iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalStep {
    /// Position in the chain, starting at 1.
    pub level: u8,
    pub question: String,
    pub answer: String,
    pub analysis: String,
}

/// Classification of a root cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum RootCauseCategory {
    Organizational,
    Process,
    Technical,
    Human,
    Structural,
    Systemic,
}

impl RootCauseCategory {
    /// Get the category name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            RootCauseCategory::Organizational => "organizational",
            RootCauseCategory::Process => "process",
            RootCauseCategory::Technical => "technical",
            RootCauseCategory::Human => "human",
            RootCauseCategory::Structural => "structural",
            RootCauseCategory::Systemic => "systemic",
        }
    }
}

impl std::fmt::Display for RootCauseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RootCauseCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "organizational" | "organisational" => Ok(RootCauseCategory::Organizational),
            "process" => Ok(RootCauseCategory::Process),
            "technical" => Ok(RootCauseCategory::Technical),
            "human" => Ok(RootCauseCategory::Human),
            "structural" => Ok(RootCauseCategory::Structural),
            "systemic" => Ok(RootCauseCategory::Systemic),
            _ => Err(format!("Unknown root cause category: {}", s)),
        }
    }
}

impl TryFrom<String> for RootCauseCategory {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Decode an explicit `null` as the field's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Structured root cause extracted from the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCauseResult {
    pub root_cause: String,
    /// Confidence in [0, 1].
    #[serde(default, deserialize_with = "null_as_default")]
    pub confidence: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub evidence: Vec<String>,
    pub category: RootCauseCategory,
    #[serde(default, deserialize_with = "null_as_default")]
    pub impact_scope: String,
}

impl RootCauseResult {
    /// Clamp confidence into [0, 1]; NaN becomes 0.
    pub fn normalized(mut self) -> Self {
        self.confidence = if self.confidence.is_nan() {
            0.0
        } else {
            self.confidence.clamp(0.0, 1.0)
        };
        self
    }
}

/// Layered remediation plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolutionResult {
    #[serde(rename = "immediate_actions", deserialize_with = "null_as_default")]
    pub immediate: Vec<String>,
    #[serde(rename = "strategic_actions", deserialize_with = "null_as_default")]
    pub strategic: Vec<String>,
    #[serde(rename = "preventive_actions", deserialize_with = "null_as_default")]
    pub preventive: Vec<String>,
    #[serde(rename = "automation_opportunities", deserialize_with = "null_as_default")]
    pub automation: Vec<String>,
    pub owner: String,
    pub complexity: String,
    pub time_horizon: String,
}

/// The caller's question restated against the root cause.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReframedQuestion {
    pub original: String,
    pub reframed: String,
    pub intent: String,
    pub goal: String,
}

/// Pipeline stage a generation call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Why,
    Evaluation,
    NextWhy,
    RootCause,
    Solution,
    Reframe,
}

impl PipelineStage {
    /// Reasoning mode every call of this stage runs under.
    pub fn mode(&self) -> ReasoningMode {
        match self {
            PipelineStage::Why | PipelineStage::NextWhy | PipelineStage::Reframe => {
                ReasoningMode::Reasoning
            }
            PipelineStage::Evaluation => ReasoningMode::Analysis,
            PipelineStage::RootCause => ReasoningMode::Diagnosis,
            PipelineStage::Solution => ReasoningMode::Planning,
        }
    }

    /// Get the stage name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Why => "why",
            PipelineStage::Evaluation => "evaluation",
            PipelineStage::NextWhy => "next_why",
            PipelineStage::RootCause => "root_cause",
            PipelineStage::Solution => "solution",
            PipelineStage::Reframe => "reframe",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Record of one generation call made during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageInvocation {
    pub stage: PipelineStage,
    /// WHY level for loop stages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    pub mode: ReasoningMode,
    pub backend: String,
    pub model: String,
    pub tokens: u32,
    pub latency_ms: u64,
    pub confidence: f64,
}

impl StageInvocation {
    /// Summarize a generation response for the trace.
    pub fn from_response(
        stage: PipelineStage,
        level: Option<u8>,
        response: &GenerationResponse,
    ) -> Self {
        Self {
            stage,
            level,
            mode: stage.mode(),
            backend: response.backend.clone(),
            model: response.model.clone(),
            tokens: response.tokens,
            latency_ms: response.latency.as_millis() as u64,
            confidence: response.confidence,
        }
    }
}

/// Completed 5-Why analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiveWhySession {
    pub session_id: String,
    /// Exactly [`WHY_DEPTH`] steps, levels contiguous from 1.
    pub steps: Vec<CausalStep>,
    pub root_cause: RootCauseResult,
    pub solution: SolutionResult,
    pub reframed: ReframedQuestion,
    pub created_at: DateTime<Utc>,
    /// Every generation call of the run, in order.
    #[serde(default)]
    pub trace: Vec<StageInvocation>,
}
