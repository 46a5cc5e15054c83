//! Gemini `embedContent` client.

use async_trait::async_trait;
use mnemo_core::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::Embedder;
use crate::llm::GEMINI_BASE_URL;

/// Output size of text-embedding-004
pub const GEMINI_EMBEDDING_DIMENSIONS: usize = 768;

pub struct GeminiEmbedder {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    content: Content<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [TextPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

impl GeminiEmbedder {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
            model,
        }
    }

    /// Override the endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            content: Content {
                parts: [TextPart { text }],
            },
        };

        let response = self
            .client
            .post(format!("{}/models/{}:embedContent", self.base_url, self.model))
            .query(&[("key", &self.api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::embedding(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::embedding(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(Error::embedding(format!("Gemini API error ({}): {}", status, body)));
        }

        let parsed: EmbedResponse = serde_json::from_str(&body)
            .map_err(|e| Error::embedding(format!("failed to parse response: {}", e)))?;

        if parsed.embedding.values.is_empty() {
            return Err(Error::embedding("empty embedding"));
        }
        Ok(parsed.embedding.values)
    }

    fn dimensions(&self) -> usize {
        GEMINI_EMBEDDING_DIMENSIONS
    }
}
