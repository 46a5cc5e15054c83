//! In-memory vector index.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use mnemo_core::{Error, Result};

use super::{SearchHit, VectorIndex, cosine_similarity, top_k};

#[derive(Debug, Clone)]
struct Record {
    vector: Vec<f32>,
    payload: serde_json::Value,
}

/// Namespaced vectors held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    namespaces: RwLock<HashMap<String, HashMap<String, Record>>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records across all namespaces.
    pub fn len(&self) -> usize {
        self.namespaces
            .read()
            .map(|ns| ns.values().map(HashMap::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Payload stored under `key`, if any.
    pub fn payload(&self, namespace: &str, key: &str) -> Option<serde_json::Value> {
        let namespaces = self.namespaces.read().ok()?;
        namespaces
            .get(namespace)?
            .get(key)
            .map(|r| r.payload.clone())
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(
        &self,
        namespace: &str,
        key: &str,
        vector: Vec<f32>,
        payload: serde_json::Value,
    ) -> Result<()> {
        let mut namespaces = self.namespaces.write().map_err(|_| Error::LockPoisoned)?;
        namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), Record { vector, payload });
        Ok(())
    }

    async fn search(&self, namespace: &str, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let namespaces = self.namespaces.read().map_err(|_| Error::LockPoisoned)?;
        let Some(records) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let hits = records
            .iter()
            .map(|(key, record)| SearchHit {
                key: key.clone(),
                score: cosine_similarity(vector, &record.vector),
                payload: record.payload.clone(),
            })
            .collect();
        Ok(top_k(hits, k))
    }

    async fn relocate(
        &self,
        from_namespace: &str,
        key: &str,
        to_namespace: &str,
        payload: serde_json::Value,
    ) -> Result<bool> {
        let mut namespaces = self.namespaces.write().map_err(|_| Error::LockPoisoned)?;
        let Some(record) = namespaces
            .get_mut(from_namespace)
            .and_then(|records| records.remove(key))
        else {
            return Ok(false);
        };

        namespaces.entry(to_namespace.to_string()).or_default().insert(
            key.to_string(),
            Record {
                vector: record.vector,
                payload,
            },
        );
        Ok(true)
    }

    async fn contains(&self, namespace: &str, key: &str) -> Result<bool> {
        let namespaces = self.namespaces.read().map_err(|_| Error::LockPoisoned)?;
        Ok(namespaces
            .get(namespace)
            .is_some_and(|records| records.contains_key(key)))
    }

    async fn count(&self, namespace: &str) -> Result<usize> {
        let namespaces = self.namespaces.read().map_err(|_| Error::LockPoisoned)?;
        Ok(namespaces.get(namespace).map_or(0, HashMap::len))
    }
}
