//! In-memory session store.

use std::collections::HashMap;
use std::sync::RwLock;

use super::SessionStore;
use crate::error::{Error, Result};
use crate::types::ChatState;

/// Session store backed by a `HashMap`. Useful for tests and single-process use.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, ChatState>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, session_id: &str) -> Result<Option<ChatState>> {
        let sessions = self.sessions.read().map_err(|_| Error::LockPoisoned)?;
        Ok(sessions.get(session_id).cloned())
    }

    fn put(&self, state: &ChatState) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(|_| Error::LockPoisoned)?;
        sessions.insert(state.session_id.clone(), state.clone());
        Ok(())
    }

    fn insert_new(&self, state: &ChatState) -> Result<bool> {
        let mut sessions = self.sessions.write().map_err(|_| Error::LockPoisoned)?;
        if sessions.contains_key(&state.session_id) {
            return Ok(false);
        }
        sessions.insert(state.session_id.clone(), state.clone());
        Ok(true)
    }

    fn list_ids(&self) -> Result<Vec<String>> {
        let sessions = self.sessions.read().map_err(|_| Error::LockPoisoned)?;
        let mut ids: Vec<String> = sessions.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
