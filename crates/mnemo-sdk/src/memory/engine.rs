//! Compression, indexing and consolidation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use mnemo_core::{
    ChatState, Clock, CompressionTrigger, ConversationSummary, Error, LongTermMemory, Result,
    SystemClock, TokenEstimator,
};
use tracing::{debug, info, warn};

use super::payload::{SummaryPayload, long_term_namespace, short_term_namespace, summary_key};
use super::prompt::summary_prompt;
use crate::config::{LongTermScope, MnemoConfig, RetentionPolicy};
use crate::embedding::{Embedder, VectorIndex};
use crate::llm::LanguageModel;

/// Whether a new summary made it into the vector index.
#[derive(Debug)]
pub enum IndexingStatus {
    Indexed,
    /// The summary is kept but not searchable until `reindex` succeeds
    Failed(Error),
}

/// Result of a compression attempt.
#[derive(Debug)]
pub enum CompressOutcome {
    /// Nothing to do: threshold not reached or no recent messages
    Skipped,
    Compressed {
        /// Stable position of the new summary
        position: usize,
        /// Messages folded into it
        messages: usize,
        indexing: IndexingStatus,
    },
}

impl CompressOutcome {
    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::Compressed { .. })
    }

    /// Turn an indexing failure into an error.
    pub fn into_result(self) -> Result<Self> {
        match self {
            Self::Compressed {
                indexing: IndexingStatus::Failed(e),
                ..
            } => Err(e),
            other => Ok(other),
        }
    }
}

/// Context memory engine.
///
/// Owns no state: every operation takes the session's `ChatState` and the
/// caller persists it afterwards. Mutating operations must run inside the
/// session's exclusive section; retrieval may run concurrently.
pub struct ContextMemoryEngine {
    pub(super) llm: Arc<dyn LanguageModel>,
    pub(super) embedder: Arc<dyn Embedder>,
    pub(super) index: Arc<dyn VectorIndex>,
    pub(super) trigger: CompressionTrigger,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) retention: RetentionPolicy,
    pub(super) top_k: usize,
    pub(super) scope: LongTermScope,
    pub(super) llm_timeout: Duration,
    pub(super) embedding_timeout: Duration,
}

/// Run `fut` with a deadline.
pub(super) async fn bounded<T>(
    operation: &str,
    limit: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(operation, limit.as_millis() as u64)),
    }
}

fn as_embedding_error(e: Error) -> Error {
    match e {
        Error::Embedding(_) => e,
        other => Error::Embedding(other.to_string()),
    }
}

impl ContextMemoryEngine {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        config: &MnemoConfig,
    ) -> Self {
        Self {
            llm,
            embedder,
            index,
            trigger: CompressionTrigger::new(&config.session),
            clock: Arc::new(SystemClock),
            retention: config.consolidation.policy,
            top_k: config.retrieval.top_k,
            scope: config.retrieval.long_term_scope,
            llm_timeout: Duration::from_secs(config.llm.timeout_secs),
            embedding_timeout: Duration::from_secs(config.embedding.timeout_secs),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.trigger = self.trigger.with_estimator(estimator);
        self
    }

    /// Override the collaborator deadlines.
    pub fn with_timeouts(mut self, llm: Duration, embedding: Duration) -> Self {
        self.llm_timeout = llm;
        self.embedding_timeout = embedding;
        self
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn scope(&self) -> LongTermScope {
        self.scope
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Compression
    // ─────────────────────────────────────────────────────────────────────────

    /// Fold `recent_messages` into a new summary if the trigger fires.
    ///
    /// All or nothing up to the summary being appended: on a model failure or
    /// timeout the state is untouched. An indexing failure afterwards is
    /// reported in the outcome and does not undo the compression.
    pub async fn compress(&self, state: &mut ChatState) -> Result<CompressOutcome> {
        if !self.trigger.should_compress(state) {
            debug!(
                session_id = %state.session_id,
                messages = state.recent_messages().len(),
                "Compression not due"
            );
            return Ok(CompressOutcome::Skipped);
        }
        self.run_compression(state).await
    }

    /// Compress whenever there is at least one recent message.
    pub async fn force_compress(&self, state: &mut ChatState) -> Result<CompressOutcome> {
        if state.recent_messages().is_empty() {
            return Ok(CompressOutcome::Skipped);
        }
        self.run_compression(state).await
    }

    async fn run_compression(&self, state: &mut ChatState) -> Result<CompressOutcome> {
        let parts = summary_prompt(state.summaries().last(), state.recent_messages());

        let content = bounded(
            "summarization",
            self.llm_timeout,
            self.llm.generate(&parts),
        )
        .await?;
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::summarization("model returned an empty summary"));
        }

        let now = self.clock.now();
        let position = state.next_summary_position();
        let summary = ConversationSummary {
            timestamp: now,
            content: content.to_string(),
        };
        state
            .short_term_memory
            .conversation_summary
            .push(summary.clone());

        let payload = SummaryPayload::short_term(&state.session_id, position, &summary);
        let indexing = match self
            .index_record(&short_term_namespace(&state.session_id), &payload)
            .await
        {
            Ok(()) => IndexingStatus::Indexed,
            Err(e) => {
                warn!(
                    session_id = %state.session_id,
                    position,
                    error = %e,
                    "Summary stored but not indexed"
                );
                IndexingStatus::Failed(e)
            }
        };

        let messages = state.short_term_memory.recent_messages.len();
        state.short_term_memory.recent_messages.clear();
        state.touch(now);

        info!(
            session_id = %state.session_id,
            position,
            messages,
            model = self.llm.name(),
            "Compressed recent messages"
        );

        Ok(CompressOutcome::Compressed {
            position,
            messages,
            indexing,
        })
    }

    /// Embed and upsert one summary record.
    async fn index_record(&self, namespace: &str, payload: &SummaryPayload) -> Result<()> {
        let vector = bounded(
            "embedding",
            self.embedding_timeout,
            self.embedder.embed(&payload.content),
        )
        .await
        .map_err(as_embedding_error)?;

        bounded(
            "index upsert",
            self.embedding_timeout,
            self.index.upsert(
                namespace,
                &summary_key(&payload.session_id, payload.position),
                vector,
                payload.to_value(),
            ),
        )
        .await
        .map_err(as_embedding_error)
    }

    /// Index every summary, in either tier, that has no vector record yet.
    ///
    /// Returns the number of records written.
    pub async fn reindex(&self, state: &ChatState) -> Result<usize> {
        let session_id = &state.session_id;
        let mut pending = Vec::new();

        let long_ns = long_term_namespace(session_id, self.scope);
        let mut position = 0;
        for (batch, memory) in state.long_term_memory.iter().enumerate() {
            for summary in &memory.summaries {
                pending.push((
                    long_ns.clone(),
                    SummaryPayload::long_term(session_id, position, summary, batch, memory.timestamp),
                ));
                position += 1;
            }
        }

        let short_ns = short_term_namespace(session_id);
        for (i, summary) in state.summaries().iter().enumerate() {
            pending.push((
                short_ns.clone(),
                SummaryPayload::short_term(session_id, state.summary_position(i), summary),
            ));
        }

        let mut written = 0;
        for (namespace, payload) in pending {
            let key = summary_key(session_id, payload.position);
            let present = bounded(
                "index lookup",
                self.embedding_timeout,
                self.index.contains(&namespace, &key),
            )
            .await
            .map_err(as_embedding_error)?;
            if present {
                continue;
            }
            self.index_record(&namespace, &payload).await?;
            written += 1;
        }

        if written > 0 {
            info!(session_id = %session_id, written, "Re-indexed summaries");
        }
        Ok(written)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Consolidation
    // ─────────────────────────────────────────────────────────────────────────

    /// How many of the oldest short-term summaries the retention policy moves out.
    pub fn due_for_consolidation(&self, state: &ChatState) -> usize {
        let summaries = state.summaries();
        match self.retention {
            RetentionPolicy::KeepRecent { count } => summaries.len().saturating_sub(count),
            RetentionPolicy::MaxAge { seconds } => {
                let max_age = i64::try_from(seconds).unwrap_or(i64::MAX);
                let cutoff = self.clock.now().saturating_sub(max_age);
                summaries
                    .iter()
                    .take_while(|s| s.timestamp < cutoff)
                    .count()
            }
        }
    }

    /// Move due short-term summaries into one new long-term batch.
    ///
    /// Vector records are relocated, not re-embedded. If any relocation
    /// fails the ones already moved are put back and the state is left
    /// unchanged. Returns the number of summaries consolidated; zero means
    /// nothing was due.
    pub async fn consolidate(&self, state: &mut ChatState) -> Result<usize> {
        let due = self.due_for_consolidation(state);
        if due == 0 {
            debug!(session_id = %state.session_id, "Nothing to consolidate");
            return Ok(0);
        }

        let now = self.clock.now();
        let session_id = state.session_id.clone();
        let short_ns = short_term_namespace(&session_id);
        let long_ns = long_term_namespace(&session_id, self.scope);
        let batch = state.long_term_memory.len();

        let mut moved: Vec<SummaryPayload> = Vec::new();
        for (i, summary) in state.summaries()[..due].iter().enumerate() {
            let position = state.summary_position(i);
            let key = summary_key(&session_id, position);
            let payload = SummaryPayload::long_term(&session_id, position, summary, batch, now);

            match bounded(
                "index relocate",
                self.embedding_timeout,
                self.index
                    .relocate(&short_ns, &key, &long_ns, payload.to_value()),
            )
            .await
            {
                Ok(true) => moved.push(SummaryPayload::short_term(&session_id, position, summary)),
                // Never indexed; reindex will pick it up in the long-term tier
                Ok(false) => {}
                Err(e) => {
                    self.restore(&short_ns, &long_ns, moved).await;
                    return Err(Error::embedding(format!(
                        "failed to relocate {}: {}",
                        key, e
                    )));
                }
            }
        }

        let summaries: Vec<ConversationSummary> = state
            .short_term_memory
            .conversation_summary
            .drain(..due)
            .collect();
        state.long_term_memory.push(LongTermMemory {
            timestamp: now,
            summaries,
        });
        state.touch(now);

        info!(
            session_id = %session_id,
            batch,
            consolidated = due,
            relocated = moved.len(),
            "Consolidated summaries into long-term memory"
        );
        Ok(due)
    }

    /// Move the newest long-term batch's vector records back to short-term.
    ///
    /// For callers that consolidated `state` but could not persist it, so
    /// the index matches the stored state again.
    pub async fn revert_consolidation(&self, state: &ChatState) {
        let Some(memory) = state.long_term_memory.last() else {
            return;
        };
        let session_id = &state.session_id;
        let first = state.consolidated_count() - memory.summaries.len();
        let moved = memory
            .summaries
            .iter()
            .enumerate()
            .map(|(i, summary)| SummaryPayload::short_term(session_id, first + i, summary))
            .collect();
        self.restore(
            &short_term_namespace(session_id),
            &long_term_namespace(session_id, self.scope),
            moved,
        )
        .await;
        warn!(session_id = %session_id, "Reverted unsaved consolidation in the index");
    }

    /// Move relocated records back to the short-term namespace.
    async fn restore(&self, short_ns: &str, long_ns: &str, moved: Vec<SummaryPayload>) {
        for payload in moved.into_iter().rev() {
            let key = summary_key(&payload.session_id, payload.position);
            if let Err(e) = bounded(
                "index relocate",
                self.embedding_timeout,
                self.index.relocate(long_ns, &key, short_ns, payload.to_value()),
            )
            .await
            {
                warn!(key = %key, error = %e, "Failed to restore vector record");
            }
        }
    }
}
