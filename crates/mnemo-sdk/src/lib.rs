//! Mnemo SDK - context memory for conversational agents
//!
//! Builds on `mnemo-core` (state, stores, lifecycle, locks) and adds
//! everything that talks to a model:
//!
//! - **memory** - Compression, consolidation and retrieval (`ContextMemoryEngine`)
//! - **llm** - Language model seam (Gemini, offline extractive)
//! - **embedding** - Embedders and vector indexes
//! - **config** - TOML configuration
//!
//! # Example
//!
//! ```rust,no_run
//! use mnemo_sdk::{Mnemo, MnemoConfig};
//!
//! async fn example() -> mnemo_sdk::Result<()> {
//!     let mnemo = Mnemo::in_memory(MnemoConfig::default())?;
//!
//!     let report = mnemo.record_message("s1", "user", "My name is Ada").await?;
//!     if report.compression?.is_compressed() {
//!         println!("summarized");
//!     }
//!
//!     let recall = mnemo.recall("s1", "name").await?;
//!     for hit in recall.summaries {
//!         println!("{:.2} {}", hit.score, hit.summary.content);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod embedding;
pub mod llm;
pub mod memory;
pub mod sdk;

// ─────────────────────────────────────────────────────────────────────────────
// Re-export core types
// ─────────────────────────────────────────────────────────────────────────────

pub use mnemo_core::{
    BusyPolicy, ChatState, ConversationSummary, Error, ErrorClass, LongTermMemory, MemoryTier,
    Message, Result, Role, SessionConfig, SessionManager,
};

// ─────────────────────────────────────────────────────────────────────────────
// SDK types
// ─────────────────────────────────────────────────────────────────────────────

pub use config::{
    ConfigError, ConfigValidationError, ConsolidationConfig, EmbeddingConfig, EmbeddingProvider,
    LlmConfig, LlmProvider, LongTermScope, MnemoConfig, RetentionPolicy, RetrievalConfig,
};
pub use embedding::{Embedder, HashingEmbedder, InMemoryVectorIndex, SearchHit, VectorIndex};
#[cfg(feature = "db")]
pub use embedding::SqliteVectorIndex;
pub use llm::{ExtractiveModel, LanguageModel};
pub use memory::{CompressOutcome, ContextMemoryEngine, IndexingStatus, ScoredMemory, ScoredSummary};
pub use sdk::{Mnemo, Recall, TurnReport};
