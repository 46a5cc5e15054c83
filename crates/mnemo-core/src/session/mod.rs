//! Session lifecycle management.
//!
//! ## Lifecycle
//!
//! ```text
//! create / load
//!   │
//!   ├─► append_message ──► should_compress? ──yes──► (engine) compress
//!   │                                                   │
//!   │                                          (engine) consolidate
//!   │                                                   │
//!   └──────────────────────── save ◄────────────────────┘
//! ```
//!
//! Mutations on one session must not interleave. `SessionLocks` provides the
//! per-session exclusive section; the lifecycle manager itself is stateless
//! apart from its collaborators and can be shared freely.

mod lifecycle;
mod locks;
mod trigger;

pub use lifecycle::*;
pub use locks::*;
pub use trigger::*;

use serde::{Deserialize, Serialize};

/// Thresholds that decide when recent messages are compressed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Compress once this many messages are buffered (default: 10)
    pub message_count_threshold: usize,

    /// Compress once the buffered messages reach this many estimated tokens (default: 2000)
    pub token_threshold: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            message_count_threshold: 10,
            token_threshold: 2000,
        }
    }
}
