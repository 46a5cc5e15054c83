//! Context Memory Engine
//!
//! Turns a growing message buffer into a searchable memory:
//!
//! ```text
//! recent_messages ──compress──▶ short-term summaries ──consolidate──▶ long-term batches
//!                                     │                                   │
//!                                     └──── vector index (short_term/*) ──┴── (long_term/*)
//! ```
//!
//! - **Compression** summarizes recent messages with the language model and
//!   indexes the summary.
//! - **Consolidation** moves summaries past the retention window into a
//!   long-term batch and relocates their vectors.
//! - **Retrieval** ranks summaries and batches by similarity to a query.

mod engine;
pub mod payload;
pub mod prompt;
mod retrieval;
#[cfg(test)]
pub(crate) mod testing;

pub use engine::{CompressOutcome, ContextMemoryEngine, IndexingStatus};
pub use payload::{SummaryPayload, long_term_namespace, short_term_namespace, summary_key};
pub use retrieval::{ScoredMemory, ScoredSummary};
