//! Language model seam.
//!
//! The memory engine only needs one capability from a model: turn an ordered
//! list of prompt parts into text. Adapters:
//!
//! - `GeminiClient`: Google Generative Language REST API (feature `gemini`)
//! - `ExtractiveModel`: offline, deterministic, no network

mod extractive;
#[cfg(feature = "gemini")]
mod gemini;

use std::sync::Arc;

use async_trait::async_trait;
use mnemo_core::{Error, Result};

use crate::config::{LlmConfig, LlmProvider};

pub use extractive::ExtractiveModel;
#[cfg(feature = "gemini")]
pub use gemini::{GEMINI_BASE_URL, GeminiClient};

/// Text generation backend.
///
/// Implementations must not have side effects beyond the request itself;
/// the engine may call `generate` again after a failure.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion for the given prompt parts, in order.
    async fn generate(&self, parts: &[String]) -> Result<String>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Build the configured language model.
pub fn from_config(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider {
        LlmProvider::Extractive => Ok(Arc::new(ExtractiveModel::default())),
        #[cfg(feature = "gemini")]
        LlmProvider::Gemini => {
            let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                Error::Config(format!(
                    "{} is not set (required by llm.provider = \"gemini\")",
                    config.api_key_env
                ))
            })?;
            Ok(Arc::new(GeminiClient::new(api_key, config.model.clone())))
        }
        #[cfg(not(feature = "gemini"))]
        LlmProvider::Gemini => Err(Error::Config(
            "llm.provider = \"gemini\" requires the gemini feature".into(),
        )),
    }
}
