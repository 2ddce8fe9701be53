use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    BackendRequest, GenerationBackend, GenerationRequest, GenerationResponse, Policy,
    ReasoningMode,
};
use crate::cancel::cancellable;
use crate::config::ModelConfig;
use crate::error::{GenerationError, GenerationResult};

/// Token budget applied when a request asks for zero.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Mode to model-name routing table.
///
/// Modes without an entry fall back to the [`ReasoningMode::Default`] entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelTable {
    models: HashMap<ReasoningMode, String>,
}

impl ModelTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    /// Set the model for a mode, replacing any previous entry.
    pub fn with_model(mut self, mode: ReasoningMode, model: impl Into<String>) -> Self {
        self.models.insert(mode, model.into());
        self
    }

    /// Resolve the model for `mode`, falling back to the default-mode model.
    pub fn resolve(&self, mode: ReasoningMode) -> Option<&str> {
        self.models
            .get(&mode)
            .filter(|m| !m.is_empty())
            .or_else(|| self.models.get(&ReasoningMode::Default))
            .map(String::as_str)
    }
}

impl Default for ModelTable {
    fn default() -> Self {
        Self::from(&ModelConfig::default())
    }
}

impl From<&ModelConfig> for ModelTable {
    fn from(config: &ModelConfig) -> Self {
        config
            .entries()
            .into_iter()
            .fold(ModelTable::new(), |table, (mode, model)| {
                table.with_model(mode, model)
            })
    }
}

/// Owns the back-end registry, routing policy and model table.
///
/// Build one per process (or per test), register back ends, then share it
/// behind an `Arc`; the registry is read-only once runs start.
pub struct GenerationEngine {
    backends: HashMap<String, Arc<dyn GenerationBackend>>,
    policy: Policy,
    models: ModelTable,
}

impl GenerationEngine {
    /// Create an engine with the default policy and model table and no back ends.
    pub fn new() -> Self {
        Self::with_routing(Policy::default(), ModelTable::default())
    }

    /// Create an engine with explicit routing configuration.
    pub fn with_routing(policy: Policy, models: ModelTable) -> Self {
        Self {
            backends: HashMap::new(),
            policy,
            models,
        }
    }

    /// Register a back end under its own name.
    ///
    /// Last registration wins: a back end already registered under the same
    /// name is replaced and returned.
    pub fn register_backend(
        &mut self,
        backend: Arc<dyn GenerationBackend>,
    ) -> Option<Arc<dyn GenerationBackend>> {
        let name = backend.name().to_string();
        let previous = self.backends.insert(name.clone(), backend);
        if previous.is_some() {
            warn!(backend = %name, "Replacing previously registered generation back end");
        } else {
            info!(backend = %name, "Registered generation back end");
        }
        previous
    }

    /// Names of registered back ends
    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.keys().map(String::as_str).collect()
    }

    /// Routing policy in use
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Validate, route and dispatch a generation request.
    pub async fn generate(
        &self,
        request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> GenerationResult<GenerationResponse> {
        if request.prompt.trim().is_empty() {
            return Err(GenerationError::InvalidRequest {
                message: "prompt cannot be empty".to_string(),
            });
        }

        let mode = request.mode.unwrap_or_default();
        let max_tokens = if request.max_tokens == 0 {
            DEFAULT_MAX_TOKENS
        } else {
            request.max_tokens
        };

        let backend_name = self.policy.select_backend(mode)?;
        let backend = self.backends.get(backend_name).ok_or_else(|| {
            GenerationError::BackendNotRegistered {
                name: backend_name.to_string(),
            }
        })?;

        let model = self.models.resolve(mode).unwrap_or_default().to_string();

        debug!(
            backend = %backend_name,
            mode = %mode,
            model = %model,
            prompt_chars = request.prompt.len(),
            "Dispatching generation request"
        );

        let backend_request = BackendRequest {
            prompt: request.prompt,
            temperature: request.temperature,
            max_tokens,
            model: model.clone(),
        };

        let start = Instant::now();
        let result = cancellable(cancel, async {
            backend
                .generate(backend_request)
                .await
                .map_err(GenerationError::from)
        })
        .await;
        let latency = start.elapsed();

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                error!(
                    backend = %backend_name,
                    mode = %mode,
                    error = %e,
                    latency_ms = latency.as_millis(),
                    "Generation call failed"
                );
                return Err(e);
            }
        };

        let confidence = self.policy.estimate_confidence(mode, &output.text);

        debug!(
            backend = %backend_name,
            mode = %mode,
            tokens = output.tokens,
            latency_ms = latency.as_millis(),
            confidence,
            "Generation call succeeded"
        );

        Ok(GenerationResponse {
            text: output.text,
            tokens: output.tokens,
            latency,
            backend: backend.name().to_string(),
            model: if output.model.is_empty() {
                model
            } else {
                output.model
            },
            confidence,
        })
    }
}

impl Default for GenerationEngine {
    fn default() -> Self {
        Self::new()
    }
}
