//! Session lifecycle manager.
//!
//! Creates, loads and saves sessions and applies the simple field mutations.
//! Compression itself lives in the memory engine; this manager only answers
//! whether it is due.

use std::sync::Arc;

use super::{CompressionTrigger, SessionConfig, TokenEstimator};
use crate::error::{Error, Result};
use crate::store::SessionStore;
use crate::types::{ChatState, Message, Role};
use crate::utils::{Clock, SystemClock};

/// Longest accepted session id.
pub const MAX_SESSION_ID_LEN: usize = 128;

/// Validate a caller-supplied session id.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    if session_id.trim().is_empty() {
        return Err(Error::validation("session id cannot be empty"));
    }
    if session_id.len() > MAX_SESSION_ID_LEN {
        return Err(Error::validation(format!(
            "session id must be {} bytes or less",
            MAX_SESSION_ID_LEN
        )));
    }
    if session_id.chars().any(char::is_control) {
        return Err(Error::validation("session id cannot contain control characters"));
    }
    Ok(())
}

/// Session lifecycle manager.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    trigger: CompressionTrigger,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    /// Create a manager over `store` with the given thresholds.
    pub fn new(store: Arc<dyn SessionStore>, config: &SessionConfig) -> Self {
        Self {
            store,
            trigger: CompressionTrigger::new(config),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used to stamp mutations.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the token estimator used by the compression trigger.
    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.trigger = self.trigger.with_estimator(estimator);
        self
    }

    pub fn trigger(&self) -> &CompressionTrigger {
        &self.trigger
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an empty session and reserve its id in the store.
    pub fn create(&self, session_id: &str) -> Result<ChatState> {
        validate_session_id(session_id)?;

        let state = ChatState::new(session_id, self.clock.now());
        let inserted = self.store.insert_new(&state).map_err(into_persistence)?;
        if !inserted {
            return Err(Error::DuplicateSession(session_id.to_string()));
        }

        tracing::info!(session_id, "Session created");
        Ok(state)
    }

    /// Load a stored session. A missing session is `Ok(None)`.
    pub fn load(&self, session_id: &str) -> Result<Option<ChatState>> {
        self.store.get(session_id).map_err(into_persistence)
    }

    /// Load the session, creating it when it does not exist yet.
    pub fn load_or_create(&self, session_id: &str) -> Result<ChatState> {
        if let Some(state) = self.load(session_id)? {
            return Ok(state);
        }
        match self.create(session_id) {
            Ok(state) => Ok(state),
            // Lost a creation race; the other writer's state wins.
            Err(Error::DuplicateSession(_)) => self
                .load(session_id)?
                .ok_or_else(|| Error::persistence(format!("session {} vanished", session_id))),
            Err(e) => Err(e),
        }
    }

    /// Write the full state. On failure the caller's copy stays authoritative.
    pub fn save(&self, state: &ChatState) -> Result<()> {
        self.store.put(state).map_err(into_persistence)?;
        tracing::debug!(session_id = %state.session_id, update_time = state.update_time, "Session saved");
        Ok(())
    }

    /// All stored session ids.
    pub fn list(&self) -> Result<Vec<String>> {
        self.store.list_ids().map_err(into_persistence)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a message given its role as text (`user` or `assistant`).
    pub fn append_message(&self, state: &mut ChatState, role: &str, content: &str) -> Result<()> {
        let role: Role = role.parse()?;
        self.append(state, role, content);
        Ok(())
    }

    /// Append a message with an already-parsed role.
    pub fn append(&self, state: &mut ChatState, role: Role, content: &str) {
        state
            .short_term_memory
            .recent_messages
            .push(Message::new(role, content));
        if role == Role::User {
            state.last_user_message = content.to_string();
        }
        state.touch(self.clock.now());
    }

    pub fn set_intent(&self, state: &mut ChatState, intent: &str) {
        state.intent = intent.to_string();
        state.touch(self.clock.now());
    }

    pub fn set_topic(&self, state: &mut ChatState, topic: &str) {
        state.topic = topic.to_string();
        state.touch(self.clock.now());
    }

    pub fn set_preference(&self, state: &mut ChatState, key: &str, value: serde_json::Value) {
        state.preference.insert(key.to_string(), value);
        state.touch(self.clock.now());
    }

    /// Whether the session's recent messages are due for compression. Pure.
    pub fn should_compress(&self, state: &ChatState) -> bool {
        self.trigger.should_compress(state)
    }
}

fn into_persistence(e: Error) -> Error {
    match e {
        Error::Persistence(_) => e,
        other => Error::Persistence(other.to_string()),
    }
}
