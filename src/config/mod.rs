use std::env;
use std::path::PathBuf;

use crate::error::AppError;
use crate::generation::ReasoningMode;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    pub langbase: LangbaseConfig,
    pub models: ModelConfig,
    pub database: DatabaseConfig,
    pub memory: MemoryConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub features: FeatureConfig,
}

/// Which generation back end the binary registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Langbase pipes over HTTP.
    Langbase,
    /// Offline placeholder back end.
    Local,
}

/// Generation back-end selection
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Logical name the back end registers under.
    pub name: String,
}

/// Langbase API configuration
#[derive(Debug, Clone)]
pub struct LangbaseConfig {
    pub api_key: String,
    pub base_url: String,
}

/// Model (pipe) name per reasoning mode
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub reasoning: String,
    pub analysis: String,
    pub diagnosis: String,
    pub planning: String,
    pub default: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Long-term memory configuration
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    pub embedding_dimension: usize,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration for remote back ends
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Service feature switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureConfig {
    pub five_why: bool,
    pub root_cause: bool,
    pub reframe: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let kind = match env::var("BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "langbase" => BackendKind::Langbase,
            "local" => BackendKind::Local,
            other => {
                return Err(AppError::Config {
                    message: format!("Unsupported BACKEND: {}", other),
                })
            }
        };

        let backend = BackendConfig {
            kind,
            name: env::var("BACKEND_NAME").unwrap_or_else(|_| "primary".to_string()),
        };

        let api_key = match (kind, env::var("LANGBASE_API_KEY")) {
            (_, Ok(key)) => key,
            (BackendKind::Langbase, Err(_)) => {
                return Err(AppError::Config {
                    message: "LANGBASE_API_KEY is required when BACKEND=langbase".to_string(),
                })
            }
            (BackendKind::Local, Err(_)) => String::new(),
        };

        let langbase = LangbaseConfig {
            api_key,
            base_url: env::var("LANGBASE_BASE_URL")
                .unwrap_or_else(|_| "https://api.langbase.com".to_string()),
        };

        let defaults = ModelConfig::default();
        let models = ModelConfig {
            reasoning: env::var("MODEL_REASONING").unwrap_or(defaults.reasoning),
            analysis: env::var("MODEL_ANALYSIS").unwrap_or(defaults.analysis),
            diagnosis: env::var("MODEL_DIAGNOSIS").unwrap_or(defaults.diagnosis),
            planning: env::var("MODEL_PLANNING").unwrap_or(defaults.planning),
            default: env::var("MODEL_DEFAULT").unwrap_or(defaults.default),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/reasoning.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let memory = MemoryConfig {
            embedding_dimension: env::var("EMBEDDING_DIMENSION")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&d: &usize| d > 0)
                .unwrap_or(crate::embedding::DEFAULT_DIMENSION),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30000),
            max_retries: env::var("MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            retry_delay_ms: env::var("RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),
        };

        let features = FeatureConfig {
            five_why: flag("FEATURE_FIVE_WHY"),
            root_cause: flag("FEATURE_ROOT_CAUSE"),
            reframe: flag("FEATURE_REFRAME"),
        };

        Ok(Config {
            backend,
            langbase,
            models,
            database,
            memory,
            logging,
            request,
            features,
        })
    }
}

/// Boolean switch that defaults to enabled; `false`, `0`, `off` and `no` disable it.
fn flag(name: &str) -> bool {
    match env::var(name) {
        Ok(v) => !matches!(v.to_lowercase().as_str(), "false" | "0" | "off" | "no"),
        Err(_) => true,
    }
}

impl ModelConfig {
    /// Model names keyed by the mode that routes to them.
    pub fn entries(&self) -> [(ReasoningMode, &str); 5] {
        [
            (ReasoningMode::Reasoning, self.reasoning.as_str()),
            (ReasoningMode::Analysis, self.analysis.as_str()),
            (ReasoningMode::Diagnosis, self.diagnosis.as_str()),
            (ReasoningMode::Planning, self.planning.as_str()),
            (ReasoningMode::Default, self.default.as_str()),
        ]
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            reasoning: "reasoning-model".to_string(),
            analysis: "analysis-model".to_string(),
            diagnosis: "diagnosis-model".to_string(),
            planning: "planning-model".to_string(),
            default: "default-model".to_string(),
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            five_why: true,
            root_cause: true,
            reframe: true,
        }
    }
}
