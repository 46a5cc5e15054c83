//! Offline extractive summarizer.
//!
//! Keeps the first sentence of every transcript line. Useful without an API
//! key and in tests that need stable output.

use async_trait::async_trait;
use mnemo_core::{Error, Result};

use super::LanguageModel;

/// Deterministic summarizer over the last prompt part.
#[derive(Debug, Clone)]
pub struct ExtractiveModel {
    /// Longest kept fragment per line, in characters
    pub max_line_chars: usize,
    /// Longest summary, in characters
    pub max_summary_chars: usize,
}

impl Default for ExtractiveModel {
    fn default() -> Self {
        Self {
            max_line_chars: 160,
            max_summary_chars: 1200,
        }
    }
}

fn first_sentence(line: &str) -> &str {
    match line.find(['.', '!', '?']) {
        Some(end) => &line[..=end],
        None => line,
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

#[async_trait]
impl LanguageModel for ExtractiveModel {
    async fn generate(&self, parts: &[String]) -> Result<String> {
        let transcript = parts
            .last()
            .ok_or_else(|| Error::summarization("empty prompt"))?;

        let fragments: Vec<String> = transcript
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| truncate_chars(first_sentence(l), self.max_line_chars))
            .collect();

        if fragments.is_empty() {
            return Err(Error::summarization("nothing to summarize"));
        }

        Ok(truncate_chars(&fragments.join(" "), self.max_summary_chars))
    }

    fn name(&self) -> &str {
        "extractive"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keeps_first_sentence_per_line() {
        let model = ExtractiveModel::default();
        let summary = model
            .generate(&[
                "Summarize.".into(),
                "user: I want to fly to Paris. In May.\nassistant: Sure! Which dates?".into(),
            ])
            .await
            .unwrap();
        assert_eq!(summary, "user: I want to fly to Paris. assistant: Sure!");
    }

    #[tokio::test]
    async fn test_deterministic() {
        let model = ExtractiveModel::default();
        let parts = vec!["user: hello there".to_string()];
        let a = model.generate(&parts).await.unwrap();
        let b = model.generate(&parts).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_truncates_long_lines() {
        let model = ExtractiveModel {
            max_line_chars: 10,
            max_summary_chars: 100,
        };
        let summary = model.generate(&["user: abcdefghijklmnop".into()]).await.unwrap();
        assert_eq!(summary.chars().count(), 10);
        assert!(summary.ends_with("..."));
    }

    #[tokio::test]
    async fn test_blank_input_fails() {
        let model = ExtractiveModel::default();
        assert!(matches!(
            model.generate(&[]).await.unwrap_err(),
            Error::Summarization(_)
        ));
        assert!(matches!(
            model.generate(&["  \n ".into()]).await.unwrap_err(),
            Error::Summarization(_)
        ));
    }
}
