use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::types::{CreatePipeRequest, Message, PipeRequest, PipeResponse};
use super::{BackendRequest, BackendResponse, GenerationBackend};
use crate::config::{LangbaseConfig, RequestConfig};
use crate::error::{BackendError, BackendResult};
use crate::prompts::SYSTEM_PROMPT;

/// Generation back end that runs Langbase pipes.
///
/// The routed model name is used as the pipe name, so every entry of the
/// mode→model table should name a provisioned pipe (see [`ensure_pipe`]).
/// Each run sends the request's temperature and token budget, overriding
/// the values the pipe was provisioned with.
/// Transient failures are retried here with exponential backoff.
///
/// [`ensure_pipe`]: LangbaseBackend::ensure_pipe
#[derive(Clone)]
pub struct LangbaseBackend {
    name: String,
    client: Client,
    base_url: String,
    api_key: String,
    request_config: RequestConfig,
}

impl LangbaseBackend {
    /// Create a new Langbase back end registered as `name`
    pub fn new(
        name: impl Into<String>,
        config: &LangbaseConfig,
        request_config: RequestConfig,
    ) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(BackendError::Http)?;

        Ok(Self {
            name: name.into(),
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_config,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run a pipe, retrying failed attempts
    pub async fn call_pipe(&self, request: PipeRequest) -> BackendResult<PipeResponse> {
        let url = format!("{}/v1/pipes/run", self.base_url);
        let pipe_name = request.name.clone();

        let mut last_error = None;
        let mut retries = 0;

        while retries <= self.request_config.max_retries {
            if retries > 0 {
                let delay = Duration::from_millis(
                    self.request_config.retry_delay_ms * (2_u64.pow(retries - 1)),
                );
                warn!(
                    pipe = %pipe_name,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying Langbase request"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();

            match self.execute_request(&url, &request).await {
                Ok(response) => {
                    info!(
                        pipe = %pipe_name,
                        latency_ms = start.elapsed().as_millis(),
                        "Langbase pipe call succeeded"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    error!(
                        pipe = %pipe_name,
                        error = %e,
                        latency_ms = start.elapsed().as_millis(),
                        retry = retries,
                        "Langbase pipe call failed"
                    );
                    last_error = Some(e);
                    retries += 1;
                }
            }
        }

        Err(BackendError::Unavailable {
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
            retries,
        })
    }

    async fn execute_request(&self, url: &str, request: &PipeRequest) -> BackendResult<PipeResponse> {
        debug!(
            pipe = %request.name,
            messages = request.messages.len(),
            "Calling Langbase pipe"
        );

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    BackendError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let pipe_response: PipeResponse =
            response
                .json()
                .await
                .map_err(|e| BackendError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        if !pipe_response.success {
            return Err(BackendError::InvalidResponse {
                message: "pipe reported success=false".to_string(),
            });
        }

        Ok(pipe_response)
    }

    /// Create or update a pipe for one routed model name.
    ///
    /// A 409 from the API means the pipe already exists and is not an error.
    pub async fn ensure_pipe(
        &self,
        pipe_name: &str,
        model: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> BackendResult<()> {
        let url = format!("{}/v1/pipes", self.base_url);
        let request = CreatePipeRequest::new(pipe_name)
            .with_description("Causal reasoning pipe")
            .with_model(model)
            .with_upsert(true)
            .with_temperature(temperature)
            .with_max_tokens(max_tokens);

        info!(pipe = %pipe_name, "Ensuring Langbase pipe exists");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(BackendError::Http)?;

        let status = response.status();
        if status.as_u16() == 409 {
            info!(pipe = %pipe_name, "Pipe already exists");
            return Ok(());
        }
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        info!(pipe = %pipe_name, "Pipe ready");
        Ok(())
    }
}

#[async_trait]
impl GenerationBackend for LangbaseBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: BackendRequest) -> BackendResult<BackendResponse> {
        let messages = vec![Message::system(SYSTEM_PROMPT), Message::user(request.prompt)];
        let pipe_request = PipeRequest::new(&request.model, messages)
            .with_temperature(f64::from(request.temperature))
            .with_max_tokens(request.max_tokens);
        let response = self.call_pipe(pipe_request).await?;

        let mut metadata = HashMap::new();
        if let Some(thread_id) = &response.thread_id {
            metadata.insert("thread_id".to_string(), thread_id.clone());
        }

        Ok(BackendResponse {
            tokens: response.completion_tokens(),
            model: response.model().unwrap_or(&request.model).to_string(),
            text: response.completion,
            metadata,
        })
    }
}
