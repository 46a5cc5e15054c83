//! Conversation state types.
//!
//! `ChatState` is the whole tracked context of one conversation. It is a
//! plain serde document: the store persists it as JSON and it carries no
//! vectors. Similarity structure lives only in the vector index.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Sender of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(Error::InvalidRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Memory tier (short-term summaries, long-term consolidated batches)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTier {
    ShortTerm,
    LongTerm,
}

impl MemoryTier {
    /// Convert from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "short_term" => Some(Self::ShortTerm),
            "long_term" => Some(Self::LongTerm),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShortTerm => "short_term",
            Self::LongTerm => "long_term",
        }
    }
}

impl std::fmt::Display for MemoryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A summary chunk produced by compressing recent messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Unix timestamp in seconds
    pub timestamp: i64,
    pub content: String,
}

/// Recent messages plus the summaries produced for this session so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortTermMemory {
    /// Messages appended since the last successful compression, oldest first
    pub recent_messages: Vec<Message>,
    /// Summaries still in the short-term tier, oldest first
    pub conversation_summary: Vec<ConversationSummary>,
}

/// One consolidation batch moved out of short-term memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongTermMemory {
    /// Unix timestamp in seconds when the batch was consolidated
    pub timestamp: i64,
    pub summaries: Vec<ConversationSummary>,
}

/// Full tracked context of one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatState {
    pub session_id: String,
    pub short_term_memory: ShortTermMemory,
    pub long_term_memory: Vec<LongTermMemory>,
    pub intent: String,
    pub topic: String,
    pub preference: BTreeMap<String, serde_json::Value>,
    pub last_user_message: String,
    /// Unix timestamp in seconds of the last mutation
    pub update_time: i64,
}

impl ChatState {
    /// Create an empty state stamped with `now`.
    pub fn new(session_id: impl Into<String>, now: i64) -> Self {
        Self {
            session_id: session_id.into(),
            short_term_memory: ShortTermMemory::default(),
            long_term_memory: Vec::new(),
            intent: String::new(),
            topic: String::new(),
            preference: BTreeMap::new(),
            last_user_message: String::new(),
            update_time: now,
        }
    }

    /// Stamp a mutation. `update_time` never moves backwards.
    pub fn touch(&mut self, now: i64) {
        self.update_time = self.update_time.max(now);
    }

    /// Number of summaries already moved into long-term batches.
    pub fn consolidated_count(&self) -> usize {
        self.long_term_memory.iter().map(|b| b.summaries.len()).sum()
    }

    /// Stable position of the short-term summary at `index`.
    ///
    /// Positions count every summary the session ever produced, so they do
    /// not shift when older summaries are consolidated.
    pub fn summary_position(&self, index: usize) -> usize {
        self.consolidated_count() + index
    }

    /// Position the next compression will assign.
    pub fn next_summary_position(&self) -> usize {
        self.summary_position(self.short_term_memory.conversation_summary.len())
    }

    pub fn recent_messages(&self) -> &[Message] {
        &self.short_term_memory.recent_messages
    }

    pub fn summaries(&self) -> &[ConversationSummary] {
        &self.short_term_memory.conversation_summary
    }
}
