//! Per-session exclusive sections.
//!
//! At most one mutating operation may be in flight per session id. Each id
//! maps to an async mutex; holders keep an owned guard for the duration of
//! the mutation. Entries nobody holds or waits on are pruned lazily.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::{Error, Result};

/// What to do when a session is already being mutated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Queue behind the current holder
    #[default]
    Wait,
    /// Fail immediately with `SessionBusy`
    Reject,
}

/// Exclusive access to one session. Released on drop.
#[derive(Debug)]
pub struct SessionGuard {
    session_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl SessionGuard {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Keyed mutex over session ids.
#[derive(Debug, Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, session_id: &str) -> Result<Arc<AsyncMutex<()>>> {
        let mut locks = self.locks.lock().map_err(|_| Error::LockPoisoned)?;
        // Only the map holds an idle entry; guards and waiters hold clones.
        locks.retain(|id, lock| id == session_id || Arc::strong_count(lock) > 1);
        Ok(locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone())
    }

    /// Wait until the session is free, then take it.
    pub async fn lock(&self, session_id: &str) -> Result<SessionGuard> {
        let lock = self.entry(session_id)?;
        let guard = lock.lock_owned().await;
        tracing::trace!(session_id, "Session lock acquired");
        Ok(SessionGuard {
            session_id: session_id.to_string(),
            _guard: guard,
        })
    }

    /// Take the session or fail with `SessionBusy`.
    pub fn try_lock(&self, session_id: &str) -> Result<SessionGuard> {
        let lock = self.entry(session_id)?;
        let guard = lock
            .try_lock_owned()
            .map_err(|_| Error::SessionBusy(session_id.to_string()))?;
        Ok(SessionGuard {
            session_id: session_id.to_string(),
            _guard: guard,
        })
    }

    /// Take the session according to `policy`.
    pub async fn acquire(&self, session_id: &str, policy: BusyPolicy) -> Result<SessionGuard> {
        match policy {
            BusyPolicy::Wait => self.lock(session_id).await,
            BusyPolicy::Reject => self.try_lock(session_id),
        }
    }

    /// Whether someone currently holds the session.
    pub fn is_locked(&self, session_id: &str) -> bool {
        let Ok(locks) = self.locks.lock() else {
            return false;
        };
        locks
            .get(session_id)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    /// Number of tracked ids (held, awaited or not yet pruned).
    pub fn tracked(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }
}
