//! # Causal Reasoning
//!
//! Structured 5-Why root-cause analysis over pluggable text-generation back
//! ends, with hybrid short-term/long-term memory.
//!
//! ## Features
//!
//! - **Generation Engine**: Registry of named back ends, mode-based routing
//!   and a deterministic confidence estimate per response
//! - **5-Why Pipeline**: Five WHY iterations followed by root-cause
//!   extraction, solution synthesis and question reframing
//! - **Memory Engine**: Session transcripts with a 24h rolling expiry plus
//!   embedded long-term documents, merged into prompt context
//! - **Cancellation**: Every back-end and store call honours a caller token
//!
//! ## Architecture
//!
//! ```text
//! ChatService → Orchestrator → GenerationEngine → Backend (Langbase / local)
//!      ↓              ↓
//! MemoryEngine → VectorStore / KeyValueStore (SQLite or in-memory)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use causal_reasoning::{AppState, Config};
//! use causal_reasoning::storage::SqliteStorage;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let state = AppState::new(config, storage)?;
//!     let cancel = CancellationToken::new();
//!     let session = state
//!         .service
//!         .five_why("", "cli", "Deploys fail intermittently", &cancel)
//!         .await?;
//!     println!("{}", session.root_cause.root_cause);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Wiring from configuration to a ready service.
pub mod app;
/// Cooperative cancellation helpers.
pub mod cancel;
/// Command-line subcommands.
pub mod cli;
/// Configuration management.
pub mod config;
/// Text embedding capability.
pub mod embedding;
/// Error types and result aliases for the application.
pub mod error;
/// Generation engine, routing policy and back ends.
pub mod generation;
/// Session and semantic memory.
pub mod memory;
/// 5-Why pipeline records and orchestration.
pub mod pipeline;
/// Prompt templates and model-output parsing.
pub mod prompts;
/// Chat service facade.
pub mod service;
/// Failure reporting for best-effort operations.
pub mod side_effects;
/// Key/value, repository and SQLite storage.
pub mod storage;
/// Vector store abstraction and in-memory implementation.
pub mod vector;

pub use app::AppState;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use service::ChatService;
