//! Text generation routing.
//!
//! This module provides:
//! - [`GenerationBackend`]: the capability every text-generation provider implements
//! - [`Policy`]: pure back-end selection and confidence scoring
//! - [`GenerationEngine`]: registry, validation, model routing and dispatch
//! - [`LangbaseBackend`] and [`LocalBackend`]: concrete back ends

mod engine;
mod langbase;
mod local;
mod policy;
mod types;

pub use engine::*;
pub use langbase::*;
pub use local::*;
pub use policy::*;
pub use types::*;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendResult;

/// Reasoning mode a generation call runs under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningMode {
    /// Causal question generation.
    Reasoning,
    /// Evaluation of an answer.
    Analysis,
    /// Root-cause inference.
    Diagnosis,
    /// Remediation planning.
    Planning,
    /// Fallback when the caller sets no mode.
    #[default]
    Default,
}

impl ReasoningMode {
    /// Every mode, in routing-table order.
    pub const ALL: [ReasoningMode; 5] = [
        ReasoningMode::Reasoning,
        ReasoningMode::Analysis,
        ReasoningMode::Diagnosis,
        ReasoningMode::Planning,
        ReasoningMode::Default,
    ];

    /// Get the mode name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningMode::Reasoning => "reasoning",
            ReasoningMode::Analysis => "analysis",
            ReasoningMode::Diagnosis => "diagnosis",
            ReasoningMode::Planning => "planning",
            ReasoningMode::Default => "default",
        }
    }
}

impl std::fmt::Display for ReasoningMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ReasoningMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reasoning" => Ok(ReasoningMode::Reasoning),
            "analysis" => Ok(ReasoningMode::Analysis),
            "diagnosis" => Ok(ReasoningMode::Diagnosis),
            "planning" => Ok(ReasoningMode::Planning),
            "default" | "" => Ok(ReasoningMode::Default),
            _ => Err(format!("Unknown reasoning mode: {}", s)),
        }
    }
}

/// A caller's request to the generation engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Reasoning mode; `None` routes as [`ReasoningMode::Default`].
    #[serde(default)]
    pub mode: Option<ReasoningMode>,
    /// Rendered prompt text.
    pub prompt: String,
    /// Sampling temperature.
    #[serde(default)]
    pub temperature: f32,
    /// Token budget; zero selects [`DEFAULT_MAX_TOKENS`].
    #[serde(default)]
    pub max_tokens: u32,
    /// Free-form caller metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl GenerationRequest {
    /// Create a request for `prompt` under `mode`.
    pub fn new(mode: ReasoningMode, prompt: impl Into<String>) -> Self {
        Self {
            mode: Some(mode),
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the token budget
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Unified result of one generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Generated text.
    pub text: String,
    /// Tokens reported by the back end.
    pub tokens: u32,
    /// Wall-clock time spent in the back-end call.
    pub latency: Duration,
    /// Logical name of the back end that served the call.
    pub backend: String,
    /// Model identifier the back end reports (resolved model if it reports none).
    pub model: String,
    /// Heuristic confidence in [0, 1].
    pub confidence: f64,
}

/// What a back end receives after validation and routing.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub model: String,
}

/// What a back end returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendResponse {
    pub text: String,
    pub tokens: u32,
    /// Echo of the model identifier that produced the text.
    pub model: String,
    pub metadata: HashMap<String, String>,
}

/// A named text-generation capability.
///
/// Implementations must be safe to call concurrently from independent
/// pipeline runs. Retry and backoff, if any, live inside the implementation.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Logical name the back end registers under.
    fn name(&self) -> &str;

    /// Generate text for a routed request.
    async fn generate(&self, request: BackendRequest) -> BackendResult<BackendResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reasoning_mode_as_str() {
        assert_eq!(ReasoningMode::Reasoning.as_str(), "reasoning");
        assert_eq!(ReasoningMode::Analysis.as_str(), "analysis");
        assert_eq!(ReasoningMode::Diagnosis.as_str(), "diagnosis");
        assert_eq!(ReasoningMode::Planning.as_str(), "planning");
        assert_eq!(ReasoningMode::Default.as_str(), "default");
    }

    #[test]
    fn test_reasoning_mode_from_str() {
        assert_eq!("DIAGNOSIS".parse::<ReasoningMode>(), Ok(ReasoningMode::Diagnosis));
        assert_eq!("".parse::<ReasoningMode>(), Ok(ReasoningMode::Default));
        assert!("linear".parse::<ReasoningMode>().is_err());
    }

    #[test]
    fn test_reasoning_mode_serde_round_names() {
        let json = serde_json::to_string(&ReasoningMode::Planning).unwrap();
        assert_eq!(json, "\"planning\"");
    }

    #[test]
    fn test_generation_request_builder() {
        let request = GenerationRequest::new(ReasoningMode::Analysis, "evaluate")
            .with_temperature(0.2)
            .with_max_tokens(256)
            .with_metadata("stage", "evaluation");

        assert_eq!(request.mode, Some(ReasoningMode::Analysis));
        assert_eq!(request.max_tokens, 256);
        assert_eq!(request.metadata.get("stage").map(String::as_str), Some("evaluation"));
    }

    #[test]
    fn test_generation_request_deserialize_defaults() {
        let request: GenerationRequest = serde_json::from_str(r#"{"prompt":"hi"}"#).unwrap();
        assert_eq!(request.mode, None);
        assert_eq!(request.max_tokens, 0);
        assert!(request.metadata.is_empty());
    }
}
