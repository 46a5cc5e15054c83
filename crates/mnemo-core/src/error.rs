//! Error types for Mnemo.
//!
//! One taxonomy is shared by the lifecycle manager, the memory engine and
//! the collaborator adapters so callers can decide how to react from the
//! variant alone.

use thiserror::Error;

/// Result type alias using the Mnemo `Error`
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for Mnemo operations
#[derive(Error, Debug)]
pub enum Error {
    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid role: {0} (expected 'user' or 'assistant')")]
    InvalidRole(String),

    // Contention errors
    #[error("Session already exists: {0}")]
    DuplicateSession(String),

    #[error("Session is busy: {0}")]
    SessionBusy(String),

    // Collaborator availability
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    // Collaborator failures
    #[error("Summarization failed: {0}")]
    Summarization(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("{operation} timed out after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    // Configuration
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lock poisoned")]
    LockPoisoned,

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Broad classes used to decide how a caller should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input. Never retried.
    Validation,
    /// A collaborator could not be reached. Retry with backoff.
    Unavailable,
    /// A collaborator answered but the operation failed. State is unchanged, retry later.
    CollaboratorFailure,
    /// Another caller owns the resource. Surfaced immediately.
    Contention,
    /// Bugs, poisoned locks, local IO.
    Internal,
}

impl Error {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Create a summarization error
    pub fn summarization(message: impl Into<String>) -> Self {
        Self::Summarization(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a retrieval-unavailable error
    pub fn retrieval_unavailable(message: impl Into<String>) -> Self {
        Self::RetrievalUnavailable(message.into())
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_ms,
        }
    }

    /// Classify this error
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) | Self::InvalidRole(_) | Self::Config(_) => ErrorClass::Validation,
            Self::DuplicateSession(_) | Self::SessionBusy(_) => ErrorClass::Contention,
            Self::Persistence(_) | Self::RetrievalUnavailable(_) | Self::Timeout { .. } => {
                ErrorClass::Unavailable
            }
            Self::Summarization(_) | Self::Embedding(_) => ErrorClass::CollaboratorFailure,
            Self::Serialization(_) | Self::Io(_) | Self::LockPoisoned | Self::Other(_) => {
                ErrorClass::Internal
            }
        }
    }

    /// Whether the caller may retry the whole operation later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::Unavailable | ErrorClass::CollaboratorFailure
        )
    }

    /// Check if this error is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(feature = "db")]
impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Persistence(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(Error::InvalidRole("system".into()).class(), ErrorClass::Validation);
        assert_eq!(Error::DuplicateSession("s1".into()).class(), ErrorClass::Contention);
        assert_eq!(Error::SessionBusy("s1".into()).class(), ErrorClass::Contention);
        assert_eq!(Error::persistence("disk full").class(), ErrorClass::Unavailable);
        assert_eq!(Error::retrieval_unavailable("down").class(), ErrorClass::Unavailable);
        assert_eq!(Error::summarization("bad").class(), ErrorClass::CollaboratorFailure);
        assert_eq!(Error::embedding("bad").class(), ErrorClass::CollaboratorFailure);
        assert_eq!(Error::LockPoisoned.class(), ErrorClass::Internal);
    }

    #[test]
    fn test_retryable() {
        assert!(Error::timeout("generate", 5000).is_retryable());
        assert!(Error::summarization("model refused").is_retryable());
        assert!(!Error::validation("empty id").is_retryable());
        assert!(!Error::SessionBusy("s1".into()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = Error::timeout("generate", 5000);
        assert!(err.is_timeout());
        assert!(err.to_string().contains("generate"));
        assert!(err.to_string().contains("5000"));

        let err = Error::InvalidRole("system".into());
        assert!(err.to_string().contains("system"));
    }
}
