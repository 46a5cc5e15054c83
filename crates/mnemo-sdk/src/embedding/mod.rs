//! Embeddings and vector search.
//!
//! Two seams live here:
//!
//! - [`Embedder`] turns text into a vector (hashing, Gemini or local fastembed)
//! - [`VectorIndex`] stores vectors with JSON payloads under namespaces and
//!   answers cosine top-k queries (in-memory or SQLite)
//!
//! Both indexes are brute force. Conversation summaries number in the
//! hundreds per session, so a scan beats maintaining an ANN structure.

#[cfg(feature = "embeddings")]
mod local;
#[cfg(feature = "gemini")]
mod gemini;
mod hashing;
mod index;
#[cfg(feature = "db")]
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use mnemo_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::config::{EmbeddingConfig, EmbeddingProvider};

#[cfg(feature = "embeddings")]
pub use local::FastEmbedder;
#[cfg(feature = "gemini")]
pub use gemini::GeminiEmbedder;
pub use hashing::HashingEmbedder;
pub use index::InMemoryVectorIndex;
#[cfg(feature = "db")]
pub use sqlite::SqliteVectorIndex;

/// Text embedding backend.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Vector size this embedder produces.
    fn dimensions(&self) -> usize;
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub key: String,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
    pub payload: serde_json::Value,
}

/// Namespaced vector store.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the record stored under `key`.
    async fn upsert(
        &self,
        namespace: &str,
        key: &str,
        vector: Vec<f32>,
        payload: serde_json::Value,
    ) -> Result<()>;

    /// Up to `k` hits by descending cosine score. Empty namespace gives no hits.
    async fn search(&self, namespace: &str, vector: &[f32], k: usize) -> Result<Vec<SearchHit>>;

    /// Move a record to another namespace, keeping its vector and replacing
    /// its payload. Returns `false` when the record does not exist.
    async fn relocate(
        &self,
        from_namespace: &str,
        key: &str,
        to_namespace: &str,
        payload: serde_json::Value,
    ) -> Result<bool>;

    async fn contains(&self, namespace: &str, key: &str) -> Result<bool>;

    /// Number of records in a namespace.
    async fn count(&self, namespace: &str) -> Result<usize>;
}

/// Compute cosine similarity between two vectors
///
/// Returns a value between -1.0 and 1.0. Mismatched lengths and zero
/// vectors score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Sort hits by descending score and keep the best `k`.
pub(crate) fn top_k(mut hits: Vec<SearchHit>, k: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.key.cmp(&b.key)));
    hits.truncate(k);
    hits
}

/// Build the configured embedder.
pub fn from_config(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider {
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbedder::new(config.dimensions))),
        #[cfg(feature = "gemini")]
        EmbeddingProvider::Gemini => {
            let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                Error::Config(format!(
                    "{} is not set (required by embedding.provider = \"gemini\")",
                    config.api_key_env
                ))
            })?;
            Ok(Arc::new(GeminiEmbedder::new(api_key, config.model.clone())))
        }
        #[cfg(not(feature = "gemini"))]
        EmbeddingProvider::Gemini => Err(Error::Config(
            "embedding.provider = \"gemini\" requires the gemini feature".into(),
        )),
        #[cfg(feature = "embeddings")]
        EmbeddingProvider::Fastembed => Ok(Arc::new(FastEmbedder::new())),
        #[cfg(not(feature = "embeddings"))]
        EmbeddingProvider::Fastembed => Err(Error::Config(
            "embedding.provider = \"fastembed\" requires the embeddings feature".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_degenerate() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_top_k_orders_and_truncates() {
        let hit = |key: &str, score: f32| SearchHit {
            key: key.into(),
            score,
            payload: serde_json::Value::Null,
        };
        let hits = top_k(vec![hit("a", 0.1), hit("b", 0.9), hit("c", 0.5)], 2);
        let keys: Vec<_> = hits.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn test_from_config_hashing() {
        let embedder = from_config(&EmbeddingConfig::default()).unwrap();
        assert_eq!(embedder.dimensions(), 256);
    }
}
