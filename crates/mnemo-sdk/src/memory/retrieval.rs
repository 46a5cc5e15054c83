//! Semantic retrieval over both memory tiers.
//!
//! Retrieval reads the caller's `ChatState` and the vector index but never
//! mutates either, so it runs outside the session's exclusive section.

use std::cmp::Ordering;
use std::collections::HashMap;

use mnemo_core::{ChatState, ConversationSummary, Error, LongTermMemory, MemoryTier, Result};
use serde::Serialize;
use tracing::{debug, warn};

use super::engine::{ContextMemoryEngine, bounded};
use super::payload::{SummaryPayload, long_term_namespace, short_term_namespace};
use crate::embedding::SearchHit;

/// Upper bound on candidates fetched per query.
const MAX_CANDIDATES: usize = 200;

/// A short-term summary with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredSummary {
    pub summary: ConversationSummary,
    pub position: usize,
    pub score: f32,
}

/// A long-term batch with the best similarity among its summaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredMemory {
    pub memory: LongTermMemory,
    pub session_id: String,
    pub batch: usize,
    pub score: f32,
}

/// Descending score, then newest first.
fn rank(a_score: f32, a_ts: i64, b_score: f32, b_ts: i64) -> Ordering {
    b_score.total_cmp(&a_score).then_with(|| b_ts.cmp(&a_ts))
}

fn decode(hit: &SearchHit, tier: MemoryTier) -> Option<SummaryPayload> {
    match SummaryPayload::from_value(&hit.payload) {
        Some(payload) if payload.tier == tier => Some(payload),
        _ => {
            warn!(key = %hit.key, "Skipping vector record with unreadable payload");
            None
        }
    }
}

struct BatchGroup {
    score: f32,
    batch_timestamp: i64,
    summaries: Vec<(usize, ConversationSummary)>,
}

impl ContextMemoryEngine {
    fn candidates(&self) -> usize {
        self.top_k.saturating_mul(5).clamp(self.top_k, MAX_CANDIDATES.max(self.top_k))
    }

    async fn search_namespace(&self, namespace: &str, query: &str) -> Result<Vec<SearchHit>> {
        let unavailable = |e: Error| Error::retrieval_unavailable(e.to_string());

        let vector = bounded("query embedding", self.embedding_timeout, self.embedder.embed(query))
            .await
            .map_err(unavailable)?;

        let hits = bounded(
            "vector search",
            self.embedding_timeout,
            self.index.search(namespace, &vector, self.candidates()),
        )
        .await
        .map_err(unavailable)?;

        debug!(namespace, hits = hits.len(), "Vector search");
        Ok(hits)
    }

    /// Top-K short-term summaries of this session, with scores.
    pub async fn search_summaries(&self, state: &ChatState, query: &str) -> Result<Vec<ScoredSummary>> {
        let hits = self
            .search_namespace(&short_term_namespace(&state.session_id), query)
            .await?;

        let mut results: Vec<ScoredSummary> = hits
            .iter()
            .filter_map(|hit| {
                let payload = decode(hit, MemoryTier::ShortTerm)?;
                Some(ScoredSummary {
                    summary: payload.summary(),
                    position: payload.position,
                    score: hit.score,
                })
            })
            .collect();

        results.sort_by(|a, b| rank(a.score, a.summary.timestamp, b.score, b.summary.timestamp));
        results.truncate(self.top_k);
        Ok(results)
    }

    /// Top-K short-term summaries of this session relevant to `query`.
    pub async fn retrieve_summaries(
        &self,
        state: &ChatState,
        query: &str,
    ) -> Result<Vec<ConversationSummary>> {
        Ok(self
            .search_summaries(state, query)
            .await?
            .into_iter()
            .map(|s| s.summary)
            .collect())
    }

    /// Top-K long-term batches, with scores.
    ///
    /// Hits are grouped by batch. A batch of the caller's own session
    /// resolves from `state`; batches of other sessions (global scope) are
    /// rebuilt from their payloads and contain only the summaries that
    /// matched.
    pub async fn search_long_term(&self, state: &ChatState, query: &str) -> Result<Vec<ScoredMemory>> {
        let hits = self
            .search_namespace(&long_term_namespace(&state.session_id, self.scope), query)
            .await?;

        let mut groups: HashMap<(String, usize), BatchGroup> = HashMap::new();
        for hit in &hits {
            let Some(payload) = decode(hit, MemoryTier::LongTerm) else {
                continue;
            };
            let (Some(batch), Some(batch_timestamp)) = (payload.batch, payload.batch_timestamp)
            else {
                warn!(key = %hit.key, "Skipping long-term record without batch");
                continue;
            };

            let group = groups
                .entry((payload.session_id.clone(), batch))
                .or_insert_with(|| BatchGroup {
                    score: hit.score,
                    batch_timestamp,
                    summaries: Vec::new(),
                });
            group.score = group.score.max(hit.score);
            group.summaries.push((payload.position, payload.summary()));
        }

        let mut results: Vec<ScoredMemory> = groups
            .into_iter()
            .map(|((session_id, batch), mut group)| {
                let own = (session_id == state.session_id)
                    .then(|| state.long_term_memory.get(batch))
                    .flatten();
                let memory = match own {
                    Some(memory) => memory.clone(),
                    None => {
                        group.summaries.sort_by_key(|(position, _)| *position);
                        LongTermMemory {
                            timestamp: group.batch_timestamp,
                            summaries: group.summaries.into_iter().map(|(_, s)| s).collect(),
                        }
                    }
                };
                ScoredMemory {
                    memory,
                    session_id,
                    batch,
                    score: group.score,
                }
            })
            .collect();

        results.sort_by(|a, b| rank(a.score, a.memory.timestamp, b.score, b.memory.timestamp));
        results.truncate(self.top_k);
        Ok(results)
    }

    /// Top-K long-term batches relevant to `query`.
    pub async fn retrieve_long_term(
        &self,
        state: &ChatState,
        query: &str,
    ) -> Result<Vec<LongTermMemory>> {
        Ok(self
            .search_long_term(state, query)
            .await?
            .into_iter()
            .map(|m| m.memory)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConsolidationConfig, LongTermScope, MnemoConfig, RetentionPolicy, RetrievalConfig};
    use crate::embedding::{HashingEmbedder, InMemoryVectorIndex, VectorIndex};
    use crate::memory::testing::{FlakyIndex, ScriptedModel, ToggleEmbedder};
    use mnemo_core::{ManualClock, Message, Role, SessionConfig};
    use std::sync::Arc;
    use std::sync::atomic::Ordering as AtomicOrdering;

    fn config(top_k: usize, scope: LongTermScope) -> MnemoConfig {
        MnemoConfig::new("unused.db")
            .with_session(SessionConfig {
                message_count_threshold: 1,
                token_threshold: 100_000,
            })
            .with_consolidation(ConsolidationConfig {
                policy: RetentionPolicy::KeepRecent { count: 0 },
                auto_consolidate: true,
            })
            .with_retrieval(RetrievalConfig {
                top_k,
                long_term_scope: scope,
            })
    }

    fn engine_with(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<ToggleEmbedder>,
        config: &MnemoConfig,
        clock: Arc<ManualClock>,
    ) -> ContextMemoryEngine {
        ContextMemoryEngine::new(
            Arc::new(ScriptedModel::new()),
            embedder,
            index,
            config,
        )
        .with_clock(clock)
    }

    /// Put one summary whose content is exactly `text` into the state.
    async fn summarize(engine: &ContextMemoryEngine, clock: &ManualClock, state: &mut ChatState, text: &str) {
        // The scripted model echoes the transcript, so the summary embeds like `text`
        state
            .short_term_memory
            .recent_messages
            .push(Message::new(Role::User, text));
        clock.advance(10);
        assert!(engine.compress(state).await.unwrap().is_compressed());
    }

    #[tokio::test]
    async fn test_empty_index_returns_empty() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine_with(
            Arc::new(InMemoryVectorIndex::new()),
            Arc::new(ToggleEmbedder::default()),
            &config(3, LongTermScope::Session),
            clock,
        );
        let state = ChatState::new("s1", 0);

        assert!(engine.retrieve_summaries(&state, "anything").await.unwrap().is_empty());
        assert!(engine.retrieve_long_term(&state, "anything").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_summaries_ranked_and_limited() {
        let clock = Arc::new(ManualClock::new(0));
        let index = Arc::new(InMemoryVectorIndex::new());
        let engine = engine_with(
            index,
            Arc::new(ToggleEmbedder::default()),
            &config(2, LongTermScope::Session),
            clock.clone(),
        );
        let mut state = ChatState::new("s1", 0);

        summarize(&engine, &clock, &mut state, "flight to paris in may").await;
        summarize(&engine, &clock, &mut state, "banana bread recipe").await;
        summarize(&engine, &clock, &mut state, "hotel near the louvre in paris").await;

        let results = engine.search_summaries(&state, "paris flight").await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].summary.content.contains("flight to paris"));
        assert!(results[0].score >= results[1].score);
        assert!(results.iter().all(|r| !r.summary.content.contains("banana")));
    }

    #[tokio::test]
    async fn test_ties_break_by_newest_first() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine_with(
            Arc::new(InMemoryVectorIndex::new()),
            Arc::new(ToggleEmbedder::default()),
            &config(3, LongTermScope::Session),
            clock.clone(),
        );
        let mut state = ChatState::new("s1", 0);

        // Identical content embeds identically
        summarize(&engine, &clock, &mut state, "same words").await;
        summarize(&engine, &clock, &mut state, "same words").await;

        let results = engine.retrieve_summaries(&state, "same words").await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].timestamp > results[1].timestamp);
    }

    #[tokio::test]
    async fn test_retrieval_is_read_only() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine_with(
            Arc::new(InMemoryVectorIndex::new()),
            Arc::new(ToggleEmbedder::default()),
            &config(3, LongTermScope::Session),
            clock.clone(),
        );
        let mut state = ChatState::new("s1", 0);
        summarize(&engine, &clock, &mut state, "weather in oslo").await;
        let before = state.clone();

        engine.retrieve_summaries(&state, "oslo").await.unwrap();
        engine.retrieve_long_term(&state, "oslo").await.unwrap();
        assert_eq!(state, before);
    }

    #[tokio::test]
    async fn test_embedder_down_is_retrieval_unavailable() {
        let clock = Arc::new(ManualClock::new(0));
        let embedder = Arc::new(ToggleEmbedder::default());
        let engine = engine_with(
            Arc::new(InMemoryVectorIndex::new()),
            embedder.clone(),
            &config(3, LongTermScope::Session),
            clock,
        );
        embedder.failing.store(true, AtomicOrdering::SeqCst);
        let state = ChatState::new("s1", 0);

        let err = engine.retrieve_summaries(&state, "q").await.unwrap_err();
        assert!(matches!(err, Error::RetrievalUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_index_down_is_retrieval_unavailable() {
        let clock = Arc::new(ManualClock::new(0));
        let index = Arc::new(FlakyIndex::new());
        index.fail_search.store(true, AtomicOrdering::SeqCst);
        let engine = engine_with(
            index,
            Arc::new(ToggleEmbedder::default()),
            &config(3, LongTermScope::Session),
            clock,
        );
        let state = ChatState::new("s1", 0);

        let err = engine.retrieve_long_term(&state, "q").await.unwrap_err();
        assert!(matches!(err, Error::RetrievalUnavailable(_)));
    }

    #[tokio::test]
    async fn test_long_term_ties_break_by_newest_batch() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine_with(
            Arc::new(InMemoryVectorIndex::new()),
            Arc::new(ToggleEmbedder::default()),
            &config(3, LongTermScope::Session),
            clock.clone(),
        );
        let mut state = ChatState::new("s1", 0);
        summarize(&engine, &clock, &mut state, "same words").await;
        engine.consolidate(&mut state).await.unwrap();
        summarize(&engine, &clock, &mut state, "same words").await;
        engine.consolidate(&mut state).await.unwrap();
        assert!(state.long_term_memory[1].timestamp > state.long_term_memory[0].timestamp);

        let results = engine.search_long_term(&state, "same words").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].score, results[1].score);
        assert_eq!(results[0].batch, 1);
        assert_eq!(results[1].batch, 0);
    }

    #[tokio::test]
    async fn test_long_term_resolves_full_batch() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine_with(
            Arc::new(InMemoryVectorIndex::new()),
            Arc::new(ToggleEmbedder::default()),
            &config(3, LongTermScope::Session),
            clock.clone(),
        );
        let mut state = ChatState::new("s1", 0);
        summarize(&engine, &clock, &mut state, "user booked a flight to paris").await;
        summarize(&engine, &clock, &mut state, "user prefers aisle seats").await;
        engine.consolidate(&mut state).await.unwrap();
        summarize(&engine, &clock, &mut state, "user asked about the weather in rome").await;
        engine.consolidate(&mut state).await.unwrap();
        assert_eq!(state.long_term_memory.len(), 2);

        let results = engine.search_long_term(&state, "flight to paris").await.unwrap();
        assert_eq!(results.len(), 2);
        // Best batch first, returned whole even though one summary matched
        assert_eq!(results[0].batch, 0);
        assert_eq!(results[0].memory, state.long_term_memory[0]);
        assert_eq!(results[0].memory.summaries.len(), 2);
        assert_eq!(results[0].session_id, "s1");
    }

    #[tokio::test]
    async fn test_session_scope_hides_other_sessions() {
        let clock = Arc::new(ManualClock::new(0));
        let index = Arc::new(InMemoryVectorIndex::new());
        let engine = engine_with(
            index,
            Arc::new(ToggleEmbedder::default()),
            &config(3, LongTermScope::Session),
            clock.clone(),
        );

        let mut other = ChatState::new("s2", 0);
        summarize(&engine, &clock, &mut other, "kyoto temples itinerary").await;
        engine.consolidate(&mut other).await.unwrap();

        let mine = ChatState::new("s1", 0);
        assert!(engine.retrieve_long_term(&mine, "kyoto").await.unwrap().is_empty());
        assert!(engine.retrieve_summaries(&mine, "kyoto").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_global_scope_sees_other_sessions() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine_with(
            Arc::new(InMemoryVectorIndex::new()),
            Arc::new(ToggleEmbedder::default()),
            &config(3, LongTermScope::Global),
            clock.clone(),
        );

        let mut other = ChatState::new("s2", 0);
        summarize(&engine, &clock, &mut other, "kyoto temples itinerary").await;
        engine.consolidate(&mut other).await.unwrap();

        let mine = ChatState::new("s1", 0);
        let results = engine.search_long_term(&mine, "kyoto temples").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].session_id, "s2");
        assert_eq!(results[0].memory.summaries.len(), 1);
        assert_eq!(results[0].memory.timestamp, other.long_term_memory[0].timestamp);
    }

    #[tokio::test]
    async fn test_unreadable_payloads_are_skipped() {
        let clock = Arc::new(ManualClock::new(0));
        let index = Arc::new(InMemoryVectorIndex::new());
        let embedder = HashingEmbedder::default();
        index
            .upsert(
                "short_term/s1",
                "s1:0",
                embedder.embed_text("stray record"),
                serde_json::json!({"unexpected": true}),
            )
            .await
            .unwrap();
        let engine = engine_with(
            index,
            Arc::new(ToggleEmbedder::default()),
            &config(3, LongTermScope::Session),
            clock,
        );

        let state = ChatState::new("s1", 0);
        assert!(engine.retrieve_summaries(&state, "stray record").await.unwrap().is_empty());
    }
}
