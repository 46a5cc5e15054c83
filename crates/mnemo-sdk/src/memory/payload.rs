//! Vector record layout: namespaces, keys and payloads.
//!
//! Every summary is keyed by `{session_id}:{position}` where position is
//! its stable ordinal within the session. Payloads carry enough to rebuild
//! a result without the owning session's state.

use mnemo_core::{ConversationSummary, MemoryTier};
use serde::{Deserialize, Serialize};

use crate::config::LongTermScope;

/// Namespace holding one session's short-term summaries.
pub fn short_term_namespace(session_id: &str) -> String {
    format!("{}/{}", MemoryTier::ShortTerm.as_str(), session_id)
}

/// Namespace holding long-term summaries for `session_id` under `scope`.
pub fn long_term_namespace(session_id: &str, scope: LongTermScope) -> String {
    match scope {
        LongTermScope::Session => format!("{}/{}", MemoryTier::LongTerm.as_str(), session_id),
        LongTermScope::Global => MemoryTier::LongTerm.as_str().to_string(),
    }
}

/// Record key for the summary at `position`. Unique across sessions.
pub fn summary_key(session_id: &str, position: usize) -> String {
    format!("{}:{}", session_id, position)
}

/// JSON payload stored with every summary vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryPayload {
    pub session_id: String,
    pub tier: MemoryTier,
    pub position: usize,
    pub timestamp: i64,
    pub content: String,
    /// Index into the session's `long_term_memory` (long-term only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<usize>,
    /// When the batch was consolidated (long-term only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_timestamp: Option<i64>,
}

impl SummaryPayload {
    pub fn short_term(session_id: &str, position: usize, summary: &ConversationSummary) -> Self {
        Self {
            session_id: session_id.to_string(),
            tier: MemoryTier::ShortTerm,
            position,
            timestamp: summary.timestamp,
            content: summary.content.clone(),
            batch: None,
            batch_timestamp: None,
        }
    }

    pub fn long_term(
        session_id: &str,
        position: usize,
        summary: &ConversationSummary,
        batch: usize,
        batch_timestamp: i64,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            tier: MemoryTier::LongTerm,
            position,
            timestamp: summary.timestamp,
            content: summary.content.clone(),
            batch: Some(batch),
            batch_timestamp: Some(batch_timestamp),
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        // Plain struct of strings and integers
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            timestamp: self.timestamp,
            content: self.content.clone(),
        }
    }
}
