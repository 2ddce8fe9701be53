use thiserror::Error;

/// Raised when a caller-supplied cancellation token fires mid-operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Feature disabled: {feature}")]
    Disabled { feature: String },

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("{0}")]
    Cancelled(#[from] Cancelled),
}

/// Generation engine errors
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Invalid generation request: {message}")]
    InvalidRequest { message: String },

    #[error("Generation back end not registered: {name}")]
    BackendNotRegistered { name: String },

    #[error("Policy error: {message}")]
    Policy { message: String },

    #[error("Back end failure: {0}")]
    Backend(#[from] BackendError),

    #[error("{0}")]
    Cancelled(#[from] Cancelled),
}

/// Errors reported by a generation back end
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Back end unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Generation failed: {message}")]
    Failed { message: String },
}

/// Vector, key/value and repository store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing document id")]
    MissingId,

    #[error("Missing embedding vector")]
    MissingVector,

    #[error("Non-finite embedding component at index {index}")]
    NonFiniteVector { index: usize },

    #[error("Empty query vector")]
    EmptyVector,

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Missing session id")]
    MissingSessionId,

    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Cancelled(#[from] Cancelled),
}

/// Embedding errors
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Cannot embed empty text")]
    EmptyText,
}

/// Memory engine errors
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Missing session id")]
    MissingSessionId,

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Empty recall query")]
    EmptyQuery,

    #[error("Corrupt session transcript: {message}")]
    Corrupt { message: String },

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Cancelled(#[from] Cancelled),
}

/// Prompt rendering and model-output parsing errors
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Malformed model output: {message}")]
    MalformedModelOutput { message: String },
}

impl AppError {
    /// Whether this error, at any layer, stems from a fired cancellation token.
    pub fn is_cancelled(&self) -> bool {
        match self {
            AppError::Cancelled(_) => true,
            AppError::Generation(e) => e.is_cancelled(),
            AppError::Memory(e) => e.is_cancelled(),
            AppError::Store(e) => e.is_cancelled(),
            _ => false,
        }
    }
}

impl GenerationError {
    /// Whether the generation call was aborted by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GenerationError::Cancelled(_))
    }
}

impl StoreError {
    /// Whether the store call was aborted by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StoreError::Cancelled(_))
    }
}

impl MemoryError {
    /// Whether the memory operation was aborted by cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            MemoryError::Cancelled(_) => true,
            MemoryError::Generation(e) => e.is_cancelled(),
            MemoryError::Store(e) => e.is_cancelled(),
            _ => false,
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for generation engine operations
pub type GenerationResult<T> = Result<T, GenerationError>;

/// Result type alias for back-end calls
pub type BackendResult<T> = Result<T, BackendError>;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for memory engine operations
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Result type alias for prompt parsing
pub type PromptResult<T> = Result<T, PromptError>;
