//! SDK Configuration
//!
//! Typed configuration for the whole engine, resolved once at startup.
//!
//! Configuration is loaded with precedence:
//! 1. `MNEMO_CONFIG` (path to a TOML file)
//! 2. `<data dir>/mnemo/config.toml`
//! 3. Default values
//!
//! `MNEMO_DATABASE_PATH` overrides `database_path` from any source.
//! Unknown keys are rejected so typos fail at startup instead of silently
//! falling back to defaults.

use std::path::{Path, PathBuf};

use mnemo_core::{BusyPolicy, SessionConfig};
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MnemoConfig {
    /// Path to the SQLite database (sessions and vectors)
    pub database_path: PathBuf,

    /// Compression thresholds
    pub session: SessionConfig,

    /// Long-term consolidation policy
    pub consolidation: ConsolidationConfig,

    /// Retrieval settings
    pub retrieval: RetrievalConfig,

    /// Language model backend
    pub llm: LlmConfig,

    /// Embedding backend
    pub embedding: EmbeddingConfig,

    /// Per-session serialization
    pub concurrency: ConcurrencyConfig,
}

impl Default for MnemoConfig {
    fn default() -> Self {
        Self {
            database_path: default_data_dir().join("mnemo.db"),
            session: SessionConfig::default(),
            consolidation: ConsolidationConfig::default(),
            retrieval: RetrievalConfig::default(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            concurrency: ConcurrencyConfig::default(),
        }
    }
}

/// Which short-term summaries are due for consolidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Keep only the newest `count` summaries in short-term memory
    KeepRecent { count: usize },
    /// Keep summaries younger than `seconds`
    MaxAge { seconds: u64 },
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::KeepRecent { count: 5 }
    }
}

/// Consolidation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsolidationConfig {
    /// Retention window for short-term summaries (default: keep 5 most recent)
    pub policy: RetentionPolicy,

    /// Consolidate after every compression in `Mnemo::record_message` (default: true)
    pub auto_consolidate: bool,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            policy: RetentionPolicy::default(),
            auto_consolidate: true,
        }
    }
}

/// Whose long-term memory a retrieval may see.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LongTermScope {
    /// Only the caller's own session
    #[default]
    Session,
    /// Every session sharing the index
    Global,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Maximum results per tier (default: 3)
    pub top_k: usize,

    /// Long-term search scope (default: session)
    pub long_term_scope: LongTermScope,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            long_term_scope: LongTermScope::default(),
        }
    }
}

/// Language model backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[default]
    Gemini,
    /// Offline extractive summarizer
    Extractive,
}

/// Language model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    pub provider: LlmProvider,

    /// Model name passed to the provider
    pub model: String,

    /// Timeout for one summarization call in seconds (default: 30)
    pub timeout_secs: u64,

    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: "gemini-2.0-flash".to_string(),
            timeout_secs: 30,
            api_key_env: "GEMINI_API_KEY".to_string(),
        }
    }
}

/// Embedding backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    /// Local feature hashing, no model download
    #[default]
    Hashing,
    Gemini,
    /// Local all-MiniLM-L6-v2 (requires the `embeddings` feature)
    Fastembed,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,

    /// Model name for remote providers
    pub model: String,

    /// Vector size for the hashing provider (default: 256)
    pub dimensions: usize,

    /// Timeout for one embedding or index call in seconds (default: 10)
    pub timeout_secs: u64,

    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model: "text-embedding-004".to_string(),
            dimensions: 256,
            timeout_secs: 10,
            api_key_env: "GEMINI_API_KEY".to_string(),
        }
    }
}

/// Concurrency configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConcurrencyConfig {
    /// What a mutation does when its session is busy (default: wait)
    pub busy_policy: BusyPolicy,
}

fn default_data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        dir.join("mnemo")
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mnemo")
    }
}

impl MnemoConfig {
    /// Create a config with the given database path and defaults elsewhere
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Default::default()
        }
    }

    /// Set compression thresholds
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Set consolidation configuration
    pub fn with_consolidation(mut self, consolidation: ConsolidationConfig) -> Self {
        self.consolidation = consolidation;
        self
    }

    /// Set retrieval configuration
    pub fn with_retrieval(mut self, retrieval: RetrievalConfig) -> Self {
        self.retrieval = retrieval;
        self
    }

    /// Load from the environment-selected file, or defaults when there is none.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };

        if let Ok(db) = std::env::var("MNEMO_DATABASE_PATH") {
            config.database_path = PathBuf::from(db);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load and validate a specific TOML file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as pretty TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, self.to_toml_string()?).map_err(io_err)
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("MNEMO_CONFIG") {
            PathBuf::from(path)
        } else {
            default_data_dir().join("config.toml")
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigValidationError::MissingDatabasePath);
        }

        let positive = |field: &str, value: u64| {
            if value == 0 {
                Err(ConfigValidationError::InvalidValue {
                    field: field.into(),
                    message: "must be greater than 0".into(),
                })
            } else {
                Ok(())
            }
        };

        positive(
            "session.message_count_threshold",
            self.session.message_count_threshold as u64,
        )?;
        positive("session.token_threshold", self.session.token_threshold as u64)?;
        positive("retrieval.top_k", self.retrieval.top_k as u64)?;
        positive("llm.timeout_secs", self.llm.timeout_secs)?;
        positive("embedding.timeout_secs", self.embedding.timeout_secs)?;
        positive("embedding.dimensions", self.embedding.dimensions as u64)?;

        if let RetentionPolicy::MaxAge { seconds } = self.consolidation.policy {
            positive("consolidation.policy.seconds", seconds)?;
        }

        if self.llm.provider == LlmProvider::Gemini && self.llm.model.trim().is_empty() {
            return Err(ConfigValidationError::InvalidValue {
                field: "llm.model".into(),
                message: "required for the gemini provider".into(),
            });
        }

        if self.embedding.provider == EmbeddingProvider::Gemini
            && self.embedding.model.trim().is_empty()
        {
            return Err(ConfigValidationError::InvalidValue {
                field: "embedding.model".into(),
                message: "required for the gemini provider".into(),
            });
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("database_path is required")]
    MissingDatabasePath,

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Errors loading or saving configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Invalid(#[from] ConfigValidationError),
}

impl From<ConfigError> for mnemo_core::Error {
    fn from(e: ConfigError) -> Self {
        mnemo_core::Error::Config(e.to_string())
    }
}
