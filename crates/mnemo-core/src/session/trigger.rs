//! Compression trigger and token estimation.

use std::sync::Arc;

use super::SessionConfig;
use crate::types::{ChatState, Message};

/// Estimates how many model tokens a run of messages will cost.
///
/// The exact tokenizer belongs to the language model; the trigger only needs
/// a consistent estimate.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, messages: &[Message]) -> usize;
}

/// Character-ratio estimate: roughly four characters per token plus a fixed
/// overhead per message for role markers.
#[derive(Debug, Clone, Copy)]
pub struct CharRatioEstimator {
    pub chars_per_token: usize,
    pub per_message_overhead: usize,
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self {
            chars_per_token: 4,
            per_message_overhead: 4,
        }
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, messages: &[Message]) -> usize {
        let ratio = self.chars_per_token.max(1);
        messages
            .iter()
            .map(|m| m.content.chars().count().div_ceil(ratio) + self.per_message_overhead)
            .sum()
    }
}

/// Decides whether a session's recent messages are due for compression.
#[derive(Clone)]
pub struct CompressionTrigger {
    message_count_threshold: usize,
    token_threshold: usize,
    estimator: Arc<dyn TokenEstimator>,
}

impl std::fmt::Debug for CompressionTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressionTrigger")
            .field("message_count_threshold", &self.message_count_threshold)
            .field("token_threshold", &self.token_threshold)
            .finish_non_exhaustive()
    }
}

impl CompressionTrigger {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            message_count_threshold: config.message_count_threshold,
            token_threshold: config.token_threshold,
            estimator: Arc::new(CharRatioEstimator::default()),
        }
    }

    /// Replace the token estimator.
    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn message_count_threshold(&self) -> usize {
        self.message_count_threshold
    }

    pub fn token_threshold(&self) -> usize {
        self.token_threshold
    }

    /// Estimated tokens currently buffered in `recent_messages`.
    pub fn estimated_tokens(&self, state: &ChatState) -> usize {
        self.estimator.estimate(state.recent_messages())
    }

    /// True when the message count or the token estimate reaches its threshold.
    pub fn should_compress(&self, state: &ChatState) -> bool {
        let recent = state.recent_messages();
        if recent.is_empty() {
            return false;
        }
        recent.len() >= self.message_count_threshold
            || self.estimated_tokens(state) >= self.token_threshold
    }
}

impl Default for CompressionTrigger {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}
