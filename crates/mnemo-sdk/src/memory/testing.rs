//! Test doubles for the engine's collaborators.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mnemo_core::{Error, Result};

use crate::embedding::{Embedder, HashingEmbedder, InMemoryVectorIndex, SearchHit, VectorIndex};
use crate::llm::LanguageModel;

/// Returns queued replies in order, then a default reply. Records prompts.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<Vec<String>>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(self) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(Error::summarization("model unavailable")));
        self
    }

    pub fn prompts(&self) -> Vec<Vec<String>> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, parts: &[String]) -> Result<String> {
        self.prompts.lock().unwrap().push(parts.to_vec());
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(format!("summary of {}", parts.last().cloned().unwrap_or_default())))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Never answers in time.
pub struct StalledModel;

#[async_trait]
impl LanguageModel for StalledModel {
    async fn generate(&self, _parts: &[String]) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("too late".into())
    }

    fn name(&self) -> &str {
        "stalled"
    }
}

/// Hashing embedder that can be switched off.
#[derive(Default)]
pub struct ToggleEmbedder {
    inner: HashingEmbedder,
    pub failing: AtomicBool,
}

impl ToggleEmbedder {
    pub fn failing() -> Self {
        let embedder = Self::default();
        embedder.failing.store(true, Ordering::SeqCst);
        embedder
    }
}

#[async_trait]
impl Embedder for ToggleEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::embedding("embedding service unreachable"));
        }
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

/// In-memory index with injectable failures.
#[derive(Default)]
pub struct FlakyIndex {
    pub inner: InMemoryVectorIndex,
    pub fail_upsert: AtomicBool,
    pub fail_search: AtomicBool,
    /// Relocating this key fails
    pub fail_relocate_key: Mutex<Option<String>>,
    /// Relocating this key never completes
    pub stall_relocate_key: Mutex<Option<String>>,
    /// `contains` never completes
    pub stall_lookups: AtomicBool,
}

async fn hang() {
    tokio::time::sleep(Duration::from_secs(3600)).await;
}

impl FlakyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_relocation_of(&self, key: &str) {
        *self.fail_relocate_key.lock().unwrap() = Some(key.to_string());
    }

    pub fn stall_relocation_of(&self, key: &str) {
        *self.stall_relocate_key.lock().unwrap() = Some(key.to_string());
    }

    pub fn heal(&self) {
        self.fail_upsert.store(false, Ordering::SeqCst);
        self.fail_search.store(false, Ordering::SeqCst);
        *self.fail_relocate_key.lock().unwrap() = None;
        *self.stall_relocate_key.lock().unwrap() = None;
        self.stall_lookups.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl VectorIndex for FlakyIndex {
    async fn upsert(
        &self,
        namespace: &str,
        key: &str,
        vector: Vec<f32>,
        payload: serde_json::Value,
    ) -> Result<()> {
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(Error::persistence("index offline"));
        }
        self.inner.upsert(namespace, key, vector, payload).await
    }

    async fn search(&self, namespace: &str, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(Error::persistence("index offline"));
        }
        self.inner.search(namespace, vector, k).await
    }

    async fn relocate(
        &self,
        from_namespace: &str,
        key: &str,
        to_namespace: &str,
        payload: serde_json::Value,
    ) -> Result<bool> {
        if self.fail_relocate_key.lock().unwrap().as_deref() == Some(key) {
            return Err(Error::persistence("index offline"));
        }
        let stalled = self.stall_relocate_key.lock().unwrap().as_deref() == Some(key);
        if stalled {
            hang().await;
        }
        self.inner
            .relocate(from_namespace, key, to_namespace, payload)
            .await
    }

    async fn contains(&self, namespace: &str, key: &str) -> Result<bool> {
        if self.stall_lookups.load(Ordering::SeqCst) {
            hang().await;
        }
        self.inner.contains(namespace, key).await
    }

    async fn count(&self, namespace: &str) -> Result<usize> {
        self.inner.count(namespace).await
    }
}
