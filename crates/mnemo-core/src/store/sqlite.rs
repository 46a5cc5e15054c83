//! SQLite-backed session store.
//!
//! Each session is one row holding the JSON-encoded `ChatState`. A single
//! statement writes the whole document, so a failed write never leaves a
//! partially updated session behind.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, params};

use super::SessionStore;
use crate::error::{Error, Result};
use crate::types::ChatState;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS chat_session (
    session_id  TEXT PRIMARY KEY NOT NULL,
    state_json  TEXT NOT NULL,
    update_time INTEGER NOT NULL
);
";

/// Session store persisted in SQLite.
///
/// Thread-safe via internal Mutex. All database operations acquire the lock.
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    /// Open (or create) the database at `path` and run migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA busy_timeout=5000;")?;
        Self::from_connection(conn)
    }

    /// In-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl SessionStore for SqliteSessionStore {
    fn get(&self, session_id: &str) -> Result<Option<ChatState>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let json: Option<String> = conn
            .query_row(
                "SELECT state_json FROM chat_session WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn put(&self, state: &ChatState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute(
            "INSERT INTO chat_session (session_id, state_json, update_time)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(session_id) DO UPDATE SET
                state_json = excluded.state_json,
                update_time = excluded.update_time",
            params![&state.session_id, &json, state.update_time],
        )?;
        Ok(())
    }

    fn insert_new(&self, state: &ChatState) -> Result<bool> {
        let json = serde_json::to_string(state)?;
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO chat_session (session_id, state_json, update_time)
             VALUES (?1, ?2, ?3)",
            params![&state.session_id, &json, state.update_time],
        )?;
        Ok(inserted == 1)
    }

    fn list_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare("SELECT session_id FROM chat_session ORDER BY session_id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}
