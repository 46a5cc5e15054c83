//! mnemo-core - Core library for Mnemo
//!
//! This crate holds everything the context engine needs that does not talk
//! to a language model or an embedding service:
//!
//! - **types**: Conversation state (`ChatState`, messages, summaries, memory tiers)
//! - **error**: Error taxonomy shared by every Mnemo crate
//! - **store**: Session persistence (in-memory and SQLite)
//! - **session**: Session lifecycle, compression trigger and per-session locks
//! - **utils**: Clock abstraction

pub mod error;
pub mod session;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{Error, ErrorClass, Result};
pub use session::{
    BusyPolicy, CharRatioEstimator, CompressionTrigger, SessionConfig, SessionGuard, SessionLocks,
    SessionManager, TokenEstimator,
};
pub use store::{InMemorySessionStore, SessionStore};
#[cfg(feature = "db")]
pub use store::SqliteSessionStore;
pub use types::{
    ChatState, ConversationSummary, LongTermMemory, MemoryTier, Message, Role, ShortTermMemory,
};
pub use utils::{Clock, ManualClock, SystemClock};
