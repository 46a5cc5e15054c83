//! SQLite-backed vector index.
//!
//! Vectors are stored as little-endian f32 blobs next to their JSON payload.
//! Search loads one namespace and scores it in process.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use mnemo_core::{Error, Result};
use rusqlite::{Connection, params};
use tracing::warn;

use super::{SearchHit, VectorIndex, cosine_similarity, top_k};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS vector_record (
    namespace   TEXT NOT NULL,
    record_key  TEXT NOT NULL,
    vector      BLOB NOT NULL,
    payload     TEXT NOT NULL,
    PRIMARY KEY (namespace, record_key)
);
";

/// Vector index persisted in SQLite.
///
/// Thread-safe via internal Mutex. All database operations acquire the lock.
pub struct SqliteVectorIndex {
    conn: Mutex<Connection>,
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

impl SqliteVectorIndex {
    /// Open (or create) the database at `path`. May share a file with the session store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        Self::from_connection(conn)
    }

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

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn upsert(
        &self,
        namespace: &str,
        key: &str,
        vector: Vec<f32>,
        payload: serde_json::Value,
    ) -> Result<()> {
        let payload = serde_json::to_string(&payload)?;
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute(
            "INSERT INTO vector_record (namespace, record_key, vector, payload)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(namespace, record_key) DO UPDATE SET
                vector = excluded.vector,
                payload = excluded.payload",
            params![namespace, key, encode_vector(&vector), payload],
        )?;
        Ok(())
    }

    async fn search(&self, namespace: &str, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT record_key, vector, payload FROM vector_record WHERE namespace = ?1",
        )?;
        let rows = stmt
            .query_map(params![namespace], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Vec<u8>>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut hits = Vec::with_capacity(rows.len());
        for (key, blob, payload) in rows {
            let payload = match serde_json::from_str(&payload) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(namespace, key = %key, error = %e, "Skipping vector record with unreadable payload");
                    continue;
                }
            };
            hits.push(SearchHit {
                score: cosine_similarity(vector, &decode_vector(&blob)),
                payload,
                key,
            });
        }
        Ok(top_k(hits, k))
    }

    async fn relocate(
        &self,
        from_namespace: &str,
        key: &str,
        to_namespace: &str,
        payload: serde_json::Value,
    ) -> Result<bool> {
        let payload = serde_json::to_string(&payload)?;
        let mut conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM vector_record WHERE namespace = ?1 AND record_key = ?2",
            params![to_namespace, key],
        )?;
        let moved = tx.execute(
            "UPDATE vector_record SET namespace = ?1, payload = ?2
             WHERE namespace = ?3 AND record_key = ?4",
            params![to_namespace, payload, from_namespace, key],
        )?;
        if moved == 0 {
            // Leave any existing target record alone
            tx.rollback()?;
            return Ok(false);
        }
        tx.commit()?;
        Ok(true)
    }

    async fn contains(&self, namespace: &str, key: &str) -> Result<bool> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM vector_record WHERE namespace = ?1 AND record_key = ?2",
            params![namespace, key],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn count(&self, namespace: &str) -> Result<usize> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM vector_record WHERE namespace = ?1",
            params![namespace],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
