use async_trait::async_trait;
use std::collections::HashMap;

use super::{BackendRequest, BackendResponse, GenerationBackend, DEFAULT_BACKEND};
use crate::error::BackendResult;

/// Banner prefixed to every local response.
pub const LOCAL_RESPONSE_BANNER: &str = "[LOCAL MODEL RESPONSE PLACEHOLDER]";

/// Offline back end that echoes the prompt under a fixed banner.
///
/// Useful for wiring checks without network access. Its output never
/// contains a structured payload the pipeline can parse on its own unless
/// the prompt does.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    name: String,
}

impl LocalBackend {
    /// Create a local back end registered as `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new(DEFAULT_BACKEND)
    }
}

#[async_trait]
impl GenerationBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: BackendRequest) -> BackendResult<BackendResponse> {
        let text = format!("{}\n{}", LOCAL_RESPONSE_BANNER, request.prompt);
        let tokens = text.split_whitespace().count() as u32;
        let mut metadata = HashMap::new();
        metadata.insert("max_tokens".to_string(), request.max_tokens.to_string());

        Ok(BackendResponse {
            text,
            tokens,
            model: request.model,
            metadata,
        })
    }
}
