//! Session persistence.
//!
//! A `SessionStore` keeps one `ChatState` per session id. Writes are full
//! overwrites and must be atomic: a failed `put` leaves the previously
//! stored state in place.

mod memory;
#[cfg(feature = "db")]
mod sqlite;

pub use memory::InMemorySessionStore;
#[cfg(feature = "db")]
pub use sqlite::SqliteSessionStore;

use crate::error::Result;
use crate::types::ChatState;

/// Key-value persistence for session state.
///
/// Implementations handle the actual storage backend (SQLite, in-memory, etc.).
pub trait SessionStore: Send + Sync {
    /// Load a stored session. Absence is `Ok(None)`.
    fn get(&self, session_id: &str) -> Result<Option<ChatState>>;

    /// Overwrite the stored session atomically.
    fn put(&self, state: &ChatState) -> Result<()>;

    /// Store the session only if the id is unused. Returns `false` if it already exists.
    fn insert_new(&self, state: &ChatState) -> Result<bool>;

    /// All stored session ids, sorted.
    fn list_ids(&self) -> Result<Vec<String>>;
}
