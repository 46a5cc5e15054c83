//! Gemini `generateContent` client.

use async_trait::async_trait;
use mnemo_core::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::LanguageModel;

/// Default REST endpoint
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini text generation over REST.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self::new_custom(api_key, GEMINI_BASE_URL.to_string(), model)
    }

    /// Create with a custom base URL (proxies, test servers)
    pub fn new_custom(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
            model,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Concatenate the text of the first candidate.
fn extract_text(response: GenerateResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
    Some(text)
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, parts: &[String]) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: parts.iter().map(|p| TextPart { text: p }).collect(),
            }],
        };

        tracing::debug!(model = %self.model, parts = parts.len(), "Calling generateContent");

        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .query(&[("key", &self.api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::summarization(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::summarization(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ErrorResponse>(&body) {
                return Err(Error::summarization(format!(
                    "Gemini API error ({}): {}",
                    status, error.error.message
                )));
            }
            return Err(Error::summarization(format!("Gemini API error ({}): {}", status, body)));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| Error::summarization(format!("failed to parse response: {}", e)))?;

        extract_text(parsed).ok_or_else(|| Error::summarization("response had no candidates"))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
