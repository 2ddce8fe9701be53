//! Process-wide wiring from [`Config`] to a ready [`ChatService`].

use std::sync::Arc;

use tracing::info;

use crate::config::{BackendKind, Config};
use crate::embedding::{Embedder, HashingEmbedder};
use crate::error::{AppError, AppResult, GenerationError};
use crate::generation::{
    GenerationBackend, GenerationEngine, LangbaseBackend, LocalBackend, ModelTable, Policy,
    DEFAULT_MAX_TOKENS,
};
use crate::memory::MemoryEngine;
use crate::pipeline::Orchestrator;
use crate::service::ChatService;
use crate::side_effects::{FailureSink, TracingSink};
use crate::storage::SqliteStorage;
use crate::vector::VectorStore;

/// LLM behind every provisioned Langbase pipe.
pub const DEFAULT_PIPE_MODEL: &str = "openai:gpt-4o-mini";

/// Application state shared by every command.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// SQLite storage serving vectors, key/value entries and the repository.
    pub storage: SqliteStorage,
    /// Generation engine with the configured back end registered.
    pub generation: Arc<GenerationEngine>,
    /// Conversational facade.
    pub service: ChatService,
}

impl AppState {
    /// Build the generation engine, memory, pipeline and service over `storage`.
    pub fn new(config: Config, storage: SqliteStorage) -> AppResult<Self> {
        let generation = Arc::new(build_engine(&config)?);
        let storage = storage.with_dimension(config.memory.embedding_dimension);

        let embedder: Arc<dyn Embedder> =
            Arc::new(HashingEmbedder::new(config.memory.embedding_dimension));
        let sink: Arc<dyn FailureSink> = Arc::new(TracingSink);
        let vectors: Arc<dyn VectorStore> = Arc::new(storage.clone());
        let shared = Arc::new(storage.clone());

        let memory = Arc::new(
            MemoryEngine::new(
                shared.clone(),
                vectors.clone(),
                embedder.clone(),
                generation.clone(),
            )
            .with_sink(sink.clone()),
        );

        let orchestrator = Arc::new(
            Orchestrator::new(generation.clone(), vectors, embedder).with_sink(sink.clone()),
        );

        let service = ChatService::new(
            generation.clone(),
            orchestrator,
            memory,
            shared.clone(),
            config.features,
        )
        .with_repository(shared)
        .with_sink(sink);

        info!(
            backend = %config.backend.name,
            kind = ?config.backend.kind,
            embedding_dimension = config.memory.embedding_dimension,
            "Application state initialized"
        );

        Ok(Self {
            config,
            storage,
            generation,
            service,
        })
    }

    /// Provision a Langbase pipe named after every routed model.
    ///
    /// A no-op for the local back end.
    pub async fn ensure_pipes(&self) -> AppResult<()> {
        if self.config.backend.kind != BackendKind::Langbase {
            return Ok(());
        }

        let backend = langbase_backend(&self.config)?;
        let mut provisioned: Vec<&str> = Vec::new();
        for (_, model) in self.config.models.entries() {
            if model.is_empty() || provisioned.contains(&model) {
                continue;
            }
            backend
                .ensure_pipe(model, DEFAULT_PIPE_MODEL, 0.7, DEFAULT_MAX_TOKENS)
                .await
                .map_err(GenerationError::from)?;
            provisioned.push(model);
        }
        Ok(())
    }
}

fn langbase_backend(config: &Config) -> AppResult<LangbaseBackend> {
    LangbaseBackend::new(
        config.backend.name.clone(),
        &config.langbase,
        config.request.clone(),
    )
    .map_err(|e| AppError::Config {
        message: format!("Failed to initialize Langbase back end: {}", e),
    })
}

/// Engine routing every mode to the configured back end.
pub fn build_engine(config: &Config) -> AppResult<GenerationEngine> {
    let backend: Arc<dyn GenerationBackend> = match config.backend.kind {
        BackendKind::Langbase => Arc::new(langbase_backend(config)?),
        BackendKind::Local => Arc::new(LocalBackend::new(config.backend.name.clone())),
    };

    let mut engine = GenerationEngine::with_routing(
        Policy::single(config.backend.name.clone()),
        ModelTable::from(&config.models),
    );
    engine.register_backend(backend);
    Ok(engine)
}
