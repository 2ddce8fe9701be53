//! Command-line subcommands over the [`ChatService`].

use clap::Subcommand;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::app::AppState;
use crate::error::AppError;
use crate::service::ChatService;

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a full 5-Why root-cause analysis of a question
    FiveWhy {
        /// Problem statement to analyze
        question: String,

        /// Session to attach the analysis to (generated when omitted)
        #[arg(long, default_value = "")]
        session: String,

        /// User the analysis is logged under
        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// Send one chat message with session and semantic memory as context
    Chat {
        /// Message text
        message: String,

        /// Session the message belongs to
        #[arg(long)]
        session: String,

        /// User the exchange is logged under
        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// Search long-term memory
    Recall {
        /// Free-text query
        query: String,

        /// Maximum number of documents (0 for the default)
        #[arg(long, default_value = "5")]
        limit: i32,
    },

    /// Summarize a session transcript into long-term memory
    Compress {
        /// Session to compress
        session: String,
    },

    /// Show logged exchanges of a session, newest first
    History {
        /// Session to show
        session: String,

        /// Maximum number of exchanges (0 for the default)
        #[arg(long, default_value = "20")]
        limit: i32,
    },
}

/// Result of CLI command execution.
#[derive(Debug)]
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }

    /// Result for a run stopped by the caller.
    pub fn cancelled() -> Self {
        Self {
            exit_code: 130,
            message: "cancelled".to_string(),
        }
    }
}

/// Execute a CLI command against the application state.
pub async fn execute_command(
    command: Commands,
    state: &AppState,
    cancel: &CancellationToken,
) -> CliResult {
    let service = &state.service;
    match command {
        Commands::FiveWhy {
            question,
            session,
            user,
        } => render(service.five_why(&session, &user, &question, cancel).await),
        Commands::Chat {
            message,
            session,
            user,
        } => render(service.chat(&session, &user, &message, cancel).await),
        Commands::Recall { query, limit } => render(service.recall(&query, limit, cancel).await),
        Commands::Compress { session } => compress(service, &session, cancel).await,
        Commands::History { session, limit } => {
            render(service.history(&session, limit, cancel).await)
        }
    }
}

async fn compress(service: &ChatService, session: &str, cancel: &CancellationToken) -> CliResult {
    match service.compress_session(session, cancel).await {
        Ok(summary) => CliResult::success(summary),
        Err(e) => failure(e),
    }
}

fn render<T: Serialize>(result: Result<T, AppError>) -> CliResult {
    match result {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(json) => CliResult::success(json),
            Err(e) => CliResult::error(format!("Failed to encode result: {}", e)),
        },
        Err(e) => failure(e),
    }
}

fn failure(error: AppError) -> CliResult {
    if error.is_cancelled() {
        CliResult::cancelled()
    } else {
        CliResult::error(error.to_string())
    }
}
