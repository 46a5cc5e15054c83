//! Local embeddings with `fastembed` (all-MiniLM-L6-v2, 384 dimensions).
//!
//! The model is loaded on first use and shared afterwards.

use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use mnemo_core::{Error, Result};
use tokio::sync::RwLock;

use super::Embedder;

/// Embedding dimensions for all-MiniLM-L6-v2
pub const FASTEMBED_DIMENSIONS: usize = 384;

#[derive(Clone, Default)]
pub struct FastEmbedder {
    model: Arc<RwLock<Option<TextEmbedding>>>,
}

impl FastEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    async fn ensure_model(&self) -> Result<()> {
        if self.model.read().await.is_some() {
            return Ok(());
        }

        let mut model_guard = self.model.write().await;
        if model_guard.is_some() {
            return Ok(());
        }

        tracing::info!("Loading embedding model: all-MiniLM-L6-v2");
        let start = std::time::Instant::now();

        let mut init_options = InitOptions::default();
        init_options.model_name = EmbeddingModel::AllMiniLML6V2;
        init_options.show_download_progress = false;

        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| Error::embedding(format!("Failed to load embedding model: {}", e)))?;

        tracing::info!("Embedding model loaded in {:?}", start.elapsed());
        *model_guard = Some(model);
        Ok(())
    }

    pub async fn is_loaded(&self) -> bool {
        self.model.read().await.is_some()
    }
}

#[async_trait]
impl Embedder for FastEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.ensure_model().await?;

        let model_guard = self.model.read().await;
        let model = model_guard
            .as_ref()
            .ok_or_else(|| Error::embedding("Embedding model not initialized"))?;

        model
            .embed(vec![text], None)
            .map_err(|e| Error::embedding(format!("Failed to generate embedding: {}", e)))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("No embedding generated"))
    }

    fn dimensions(&self) -> usize {
        FASTEMBED_DIMENSIONS
    }
}
