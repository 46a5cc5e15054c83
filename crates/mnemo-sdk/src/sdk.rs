//! Main SDK Entry Point
//!
//! `Mnemo` ties the session lifecycle manager, the memory engine and the
//! per-session locks together. Every mutating call runs inside the
//! session's exclusive section and persists the state before returning.

use std::sync::Arc;

use mnemo_core::{
    ChatState, Clock, Error, InMemorySessionStore, Result, SessionGuard, SessionLocks,
    SessionManager, SessionStore, TokenEstimator,
};
use serde::Serialize;
use tracing::warn;

use crate::config::MnemoConfig;
use crate::embedding::{self, Embedder, InMemoryVectorIndex, VectorIndex};
use crate::llm::{self, LanguageModel};
use crate::memory::{CompressOutcome, ContextMemoryEngine, ScoredMemory, ScoredSummary};

/// What happened during one recorded message.
#[derive(Debug)]
pub struct TurnReport {
    /// State as persisted
    pub state: ChatState,
    /// Compression result. A failure here leaves the messages buffered for the next turn.
    pub compression: Result<CompressOutcome>,
    /// Summaries consolidated after compressing
    pub consolidation: Result<usize>,
}

/// Retrieval results for both tiers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Recall {
    pub summaries: Vec<ScoredSummary>,
    pub long_term: Vec<ScoredMemory>,
    /// Set when retrieval was unavailable and results are missing
    pub degraded: Option<String>,
}

/// Mnemo - Main entry point
///
/// # Example
///
/// ```rust,no_run
/// use mnemo_sdk::{Mnemo, MnemoConfig};
///
/// async fn example() -> mnemo_sdk::Result<()> {
///     let mnemo = Mnemo::open(MnemoConfig::load()?)?;
///
///     mnemo.record_message("s1", "user", "I want to fly to Paris in May").await?;
///     let recall = mnemo.recall("s1", "travel plans").await?;
///     println!("{} relevant summaries", recall.summaries.len());
///
///     Ok(())
/// }
/// ```
pub struct Mnemo {
    config: MnemoConfig,
    sessions: SessionManager,
    engine: ContextMemoryEngine,
    locks: SessionLocks,
}

impl Mnemo {
    /// Open the SQLite-backed engine described by `config`.
    ///
    /// Sessions and vectors share the database file at `database_path`.
    #[cfg(feature = "db")]
    pub fn open(config: MnemoConfig) -> Result<Self> {
        use crate::embedding::SqliteVectorIndex;
        use mnemo_core::SqliteSessionStore;

        config.validate().map_err(|e| Error::Config(e.to_string()))?;

        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Arc::new(SqliteSessionStore::open(&config.database_path)?);
        let index = Arc::new(SqliteVectorIndex::open(&config.database_path)?);
        let llm = llm::from_config(&config.llm)?;
        let embedder = embedding::from_config(&config.embedding)?;

        Ok(Self::from_parts(config, store, llm, embedder, index))
    }

    /// Engine with in-memory stores and the configured model backends.
    pub fn in_memory(config: MnemoConfig) -> Result<Self> {
        config.validate().map_err(|e| Error::Config(e.to_string()))?;
        let llm = llm::from_config(&config.llm)?;
        let embedder = embedding::from_config(&config.embedding)?;

        Ok(Self::from_parts(
            config,
            Arc::new(InMemorySessionStore::new()),
            llm,
            embedder,
            Arc::new(InMemoryVectorIndex::new()),
        ))
    }

    /// Assemble from explicit collaborators.
    pub fn from_parts(
        config: MnemoConfig,
        store: Arc<dyn SessionStore>,
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        let sessions = SessionManager::new(store, &config.session);
        let engine = ContextMemoryEngine::new(llm, embedder, index, &config);
        Self {
            config,
            sessions,
            engine,
            locks: SessionLocks::new(),
        }
    }

    /// Use `clock` for every timestamp.
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: self.sessions.with_clock(clock.clone()),
            engine: self.engine.with_clock(clock),
            ..self
        }
    }

    /// Use `estimator` for the compression trigger.
    pub fn with_estimator(self, estimator: Arc<dyn TokenEstimator>) -> Self {
        Self {
            sessions: self.sessions.with_estimator(estimator.clone()),
            engine: self.engine.with_estimator(estimator),
            ..self
        }
    }

    pub fn config(&self) -> &MnemoConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn engine(&self) -> &ContextMemoryEngine {
        &self.engine
    }

    async fn acquire(&self, session_id: &str) -> Result<SessionGuard> {
        self.locks
            .acquire(session_id, self.config.concurrency.busy_policy)
            .await
    }

    fn require(&self, session_id: &str) -> Result<ChatState> {
        self.sessions
            .load(session_id)?
            .ok_or_else(|| Error::validation(format!("session {} does not exist", session_id)))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn create_session(&self, session_id: &str) -> Result<ChatState> {
        let _guard = self.acquire(session_id).await?;
        self.sessions.create(session_id)
    }

    pub fn session(&self, session_id: &str) -> Result<Option<ChatState>> {
        self.sessions.load(session_id)
    }

    pub fn list_sessions(&self) -> Result<Vec<String>> {
        self.sessions.list()
    }

    /// Apply `mutate` to an existing session and persist the result.
    ///
    /// Nothing is saved when `mutate` fails.
    pub async fn update<F>(&self, session_id: &str, mutate: F) -> Result<ChatState>
    where
        F: FnOnce(&SessionManager, &mut ChatState) -> Result<()>,
    {
        let _guard = self.acquire(session_id).await?;
        let mut state = self.require(session_id)?;
        mutate(&self.sessions, &mut state)?;
        self.sessions.save(&state)?;
        Ok(state)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Turns
    // ─────────────────────────────────────────────────────────────────────────

    /// Record one message: append, compress if due, consolidate if enabled, save.
    ///
    /// The session is created on first use. Compression and consolidation
    /// failures are reported in the `TurnReport`; the message itself is
    /// always persisted unless the save fails.
    pub async fn record_message(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
    ) -> Result<TurnReport> {
        let _guard = self.acquire(session_id).await?;
        let mut state = self.sessions.load_or_create(session_id)?;
        self.sessions.append_message(&mut state, role, content)?;

        let compression = self.engine.compress(&mut state).await;
        if let Err(e) = &compression {
            warn!(session_id, error = %e, "Compression failed; messages stay buffered");
        }

        let compressed = matches!(&compression, Ok(outcome) if outcome.is_compressed());
        let consolidation = if compressed && self.config.consolidation.auto_consolidate {
            self.engine.consolidate(&mut state).await
        } else {
            Ok(0)
        };
        if let Err(e) = &consolidation {
            warn!(session_id, error = %e, "Consolidation failed");
        }

        if let Err(e) = self.sessions.save(&state) {
            if matches!(consolidation, Ok(moved) if moved > 0) {
                self.engine.revert_consolidation(&state).await;
            }
            return Err(e);
        }
        Ok(TurnReport {
            state,
            compression,
            consolidation,
        })
    }

    /// Compress now. With `force` the threshold is ignored.
    pub async fn compress(&self, session_id: &str, force: bool) -> Result<CompressOutcome> {
        let _guard = self.acquire(session_id).await?;
        let mut state = self.require(session_id)?;

        let outcome = if force {
            self.engine.force_compress(&mut state).await?
        } else {
            self.engine.compress(&mut state).await?
        };
        if outcome.is_compressed() {
            self.sessions.save(&state)?;
        }
        Ok(outcome)
    }

    /// Consolidate now. Returns the number of summaries moved.
    pub async fn consolidate(&self, session_id: &str) -> Result<usize> {
        let _guard = self.acquire(session_id).await?;
        let mut state = self.require(session_id)?;

        let moved = self.engine.consolidate(&mut state).await?;
        if moved > 0 {
            if let Err(e) = self.sessions.save(&state) {
                self.engine.revert_consolidation(&state).await;
                return Err(e);
            }
        }
        Ok(moved)
    }

    /// Index summaries that have no vector yet.
    pub async fn reindex(&self, session_id: &str) -> Result<usize> {
        let _guard = self.acquire(session_id).await?;
        let state = self.require(session_id)?;
        self.engine.reindex(&state).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Retrieval
    // ─────────────────────────────────────────────────────────────────────────

    /// Relevant summaries and long-term batches for `query`.
    ///
    /// Runs without the session lock. When the embedder or index is down the
    /// result is empty and `degraded` says why.
    pub async fn recall(&self, session_id: &str, query: &str) -> Result<Recall> {
        let state = self.require(session_id)?;
        let mut recall = Recall::default();

        match self.engine.search_summaries(&state, query).await {
            Ok(summaries) => recall.summaries = summaries,
            Err(Error::RetrievalUnavailable(reason)) => recall.degraded = Some(reason),
            Err(e) => return Err(e),
        }
        if recall.degraded.is_none() {
            match self.engine.search_long_term(&state, query).await {
                Ok(long_term) => recall.long_term = long_term,
                Err(Error::RetrievalUnavailable(reason)) => recall.degraded = Some(reason),
                Err(e) => return Err(e),
            }
        }

        if let Some(reason) = &recall.degraded {
            warn!(session_id, reason = %reason, "Retrieval degraded");
        }
        Ok(recall)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConsolidationConfig, EmbeddingProvider, LlmProvider, RetentionPolicy};
    use crate::embedding::HashingEmbedder;
    use crate::memory::IndexingStatus;
    use crate::memory::testing::{FlakyIndex, ScriptedModel, ToggleEmbedder};
    use mnemo_core::{BusyPolicy, ManualClock, SessionConfig};
    use std::sync::atomic::Ordering;

    fn config(threshold: usize, keep: usize) -> MnemoConfig {
        let mut config = MnemoConfig::new("unused.db")
            .with_session(SessionConfig {
                message_count_threshold: threshold,
                token_threshold: 100_000,
            })
            .with_consolidation(ConsolidationConfig {
                policy: RetentionPolicy::KeepRecent { count: keep },
                auto_consolidate: true,
            });
        config.llm.provider = LlmProvider::Extractive;
        config.embedding.provider = EmbeddingProvider::Hashing;
        config
    }

    fn mnemo(model: ScriptedModel, config: MnemoConfig) -> (Mnemo, Arc<FlakyIndex>) {
        let index = Arc::new(FlakyIndex::new());
        let mnemo = Mnemo::from_parts(
            config,
            Arc::new(InMemorySessionStore::new()),
            Arc::new(model),
            Arc::new(HashingEmbedder::default()),
            index.clone(),
        )
        .with_clock(Arc::new(ManualClock::new(1_000)));
        (mnemo, index)
    }

    #[tokio::test]
    async fn test_scenario_threshold_three() {
        let (mnemo, index) = mnemo(ScriptedModel::new(), config(3, 5));
        mnemo.create_session("s1").await.unwrap();

        let first = mnemo.record_message("s1", "user", "Hi").await.unwrap();
        assert!(!first.compression.unwrap().is_compressed());
        let second = mnemo.record_message("s1", "assistant", "Hello").await.unwrap();
        assert!(!second.compression.unwrap().is_compressed());

        let third = mnemo.record_message("s1", "user", "Book a flight").await.unwrap();
        assert!(third.compression.unwrap().is_compressed());
        assert_eq!(third.state.summaries().len(), 1);
        assert!(third.state.recent_messages().is_empty());
        assert_eq!(index.count("short_term/s1").await.unwrap(), 1);

        let stored = mnemo.session("s1").unwrap().unwrap();
        assert_eq!(stored, third.state);
    }

    #[tokio::test]
    async fn test_failed_compression_keeps_messages() {
        let (mnemo, _index) = mnemo(ScriptedModel::new().fail(), config(3, 5));
        for (role, text) in [("user", "a"), ("assistant", "b"), ("user", "c")] {
            mnemo.record_message("s1", role, text).await.unwrap();
        }

        let stored = mnemo.session("s1").unwrap().unwrap();
        assert_eq!(stored.summaries().len(), 0);
        assert_eq!(stored.recent_messages().len(), 3);

        // Next turn retries and succeeds
        let report = mnemo.record_message("s1", "assistant", "d").await.unwrap();
        assert!(report.compression.unwrap().is_compressed());
        assert_eq!(report.state.summaries().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_role_saves_nothing() {
        let (mnemo, _index) = mnemo(ScriptedModel::new(), config(3, 5));
        mnemo.create_session("s1").await.unwrap();

        let err = mnemo.record_message("s1", "system", "x").await.unwrap_err();
        assert!(matches!(err, Error::InvalidRole(_)));
        assert!(mnemo.session("s1").unwrap().unwrap().recent_messages().is_empty());
    }

    #[tokio::test]
    async fn test_auto_consolidation() {
        let (mnemo, index) = mnemo(ScriptedModel::new(), config(1, 0));
        let report = mnemo.record_message("s1", "user", "trip to lisbon").await.unwrap();

        assert_eq!(report.consolidation.unwrap(), 1);
        assert!(report.state.summaries().is_empty());
        assert_eq!(report.state.long_term_memory.len(), 1);
        assert_eq!(index.count("long_term/s1").await.unwrap(), 1);
    }

    /// Session store whose writes can be switched off.
    #[derive(Default)]
    struct FreezableStore {
        inner: InMemorySessionStore,
        frozen: std::sync::atomic::AtomicBool,
    }

    impl SessionStore for FreezableStore {
        fn get(&self, session_id: &str) -> Result<Option<ChatState>> {
            self.inner.get(session_id)
        }

        fn put(&self, state: &ChatState) -> Result<()> {
            if self.frozen.load(Ordering::SeqCst) {
                return Err(Error::persistence("disk full"));
            }
            self.inner.put(state)
        }

        fn insert_new(&self, state: &ChatState) -> Result<bool> {
            self.inner.insert_new(state)
        }

        fn list_ids(&self) -> Result<Vec<String>> {
            self.inner.list_ids()
        }
    }

    #[tokio::test]
    async fn test_failed_save_reverts_consolidation_in_index() {
        let store = Arc::new(FreezableStore::default());
        let index = Arc::new(FlakyIndex::new());
        let mnemo = Mnemo::from_parts(
            config(1, 0),
            store.clone(),
            Arc::new(ScriptedModel::new()),
            Arc::new(HashingEmbedder::default()),
            index.clone(),
        );
        mnemo.create_session("s1").await.unwrap();
        store.frozen.store(true, Ordering::SeqCst);

        let err = mnemo.record_message("s1", "user", "trip to lisbon").await.unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
        assert_eq!(index.count("long_term/s1").await.unwrap(), 0);
        assert_eq!(index.count("short_term/s1").await.unwrap(), 1);

        // Stored state has no summaries, so nothing is due
        store.frozen.store(false, Ordering::SeqCst);
        assert_eq!(mnemo.consolidate("s1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_and_missing_session() {
        let (mnemo, _index) = mnemo(ScriptedModel::new(), config(3, 5));
        mnemo.create_session("s1").await.unwrap();

        let state = mnemo
            .update("s1", |sessions, state| {
                sessions.set_intent(state, "book_flight");
                sessions.set_preference(state, "seat", serde_json::json!("aisle"));
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(state.intent, "book_flight");
        assert_eq!(mnemo.session("s1").unwrap().unwrap().preference["seat"], "aisle");

        let err = mnemo.update("ghost", |_, _| Ok(())).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(matches!(
            mnemo.create_session("s1").await.unwrap_err(),
            Error::DuplicateSession(_)
        ));
    }

    #[tokio::test]
    async fn test_manual_compress_and_consolidate() {
        let (mnemo, _index) = mnemo(ScriptedModel::new(), config(10, 0));
        mnemo.record_message("s1", "user", "one message").await.unwrap();

        assert!(!mnemo.compress("s1", false).await.unwrap().is_compressed());
        let outcome = mnemo.compress("s1", true).await.unwrap();
        assert!(matches!(
            outcome,
            CompressOutcome::Compressed {
                indexing: IndexingStatus::Indexed,
                ..
            }
        ));

        assert_eq!(mnemo.consolidate("s1").await.unwrap(), 1);
        assert_eq!(mnemo.consolidate("s1").await.unwrap(), 0);
        let stored = mnemo.session("s1").unwrap().unwrap();
        assert_eq!(stored.long_term_memory.len(), 1);
    }

    #[tokio::test]
    async fn test_reindex_after_index_outage() {
        let (mnemo, index) = mnemo(ScriptedModel::new(), config(1, 5));
        index.fail_upsert.store(true, Ordering::SeqCst);

        let report = mnemo.record_message("s1", "user", "hello").await.unwrap();
        assert!(matches!(
            report.compression.unwrap().into_result(),
            Err(Error::Embedding(_))
        ));

        index.heal();
        assert_eq!(mnemo.reindex("s1").await.unwrap(), 1);
        assert_eq!(index.count("short_term/s1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_recall() {
        let (mnemo, _index) = mnemo(ScriptedModel::new(), config(1, 1));
        mnemo.record_message("s1", "user", "flight to paris").await.unwrap();
        mnemo.record_message("s1", "user", "hotel in paris").await.unwrap();

        let recall = mnemo.recall("s1", "paris").await.unwrap();
        assert!(recall.degraded.is_none());
        assert_eq!(recall.summaries.len(), 1);
        assert_eq!(recall.long_term.len(), 1);
    }

    #[tokio::test]
    async fn test_recall_degraded_when_embedder_down() {
        let embedder = Arc::new(ToggleEmbedder::default());
        let mnemo = Mnemo::from_parts(
            config(3, 5),
            Arc::new(InMemorySessionStore::new()),
            Arc::new(ScriptedModel::new()),
            embedder.clone(),
            Arc::new(InMemoryVectorIndex::new()),
        );
        mnemo.create_session("s1").await.unwrap();
        embedder.failing.store(true, Ordering::SeqCst);

        let recall = mnemo.recall("s1", "anything").await.unwrap();
        assert!(recall.degraded.is_some());
        assert!(recall.summaries.is_empty());
    }

    #[tokio::test]
    async fn test_reject_policy_when_busy() {
        let mut config = config(3, 5);
        config.concurrency.busy_policy = BusyPolicy::Reject;
        let (mnemo, _index) = mnemo(ScriptedModel::new(), config);
        mnemo.create_session("s1").await.unwrap();

        let _held = mnemo.locks.try_lock("s1").unwrap();
        let err = mnemo.record_message("s1", "user", "hi").await.unwrap_err();
        assert!(matches!(err, Error::SessionBusy(_)));

        // Retrieval does not need the lock
        assert!(mnemo.recall("s1", "hi").await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_turns_are_serialized() {
        let (mnemo, _index) = mnemo(ScriptedModel::new(), config(100, 5));
        let mnemo = Arc::new(mnemo);

        let mut tasks = Vec::new();
        for i in 0..20 {
            let mnemo = mnemo.clone();
            tasks.push(tokio::spawn(async move {
                mnemo
                    .record_message("s1", "user", &format!("message {}", i))
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // No lost updates
        let stored = mnemo.session("s1").unwrap().unwrap();
        assert_eq!(stored.recent_messages().len(), 20);
    }

    #[tokio::test]
    async fn test_in_memory_constructor() {
        let mnemo = Mnemo::in_memory(config(1, 5)).unwrap();
        let report = mnemo
            .record_message("s1", "user", "The user wants a window seat.")
            .await
            .unwrap();
        assert!(report.compression.unwrap().is_compressed());
        assert_eq!(
            report.state.summaries()[0].content,
            "user: The user wants a window seat."
        );
    }

    #[cfg(feature = "db")]
    #[tokio::test]
    async fn test_open_sqlite_persists_across_instances() {
        let temp = tempfile::tempdir().expect("Failed to create temp dir");
        let config = MnemoConfig {
            database_path: temp.path().join("data").join("mnemo.db"),
            ..config(1, 5)
        };

        {
            let mnemo = Mnemo::open(config.clone()).unwrap();
            mnemo.record_message("s1", "user", "remember the milk").await.unwrap();
        }

        let mnemo = Mnemo::open(config).unwrap();
        let state = mnemo.session("s1").unwrap().unwrap();
        assert_eq!(state.summaries().len(), 1);
        let recall = mnemo.recall("s1", "milk").await.unwrap();
        assert_eq!(recall.summaries.len(), 1);
    }
}
