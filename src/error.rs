// Error taxonomy for the matching engine.
//
// Caller-input errors (Validation, DimensionMismatch) always reach the caller.
// NotAvailable and Storage are operational: the vector path degrades on them
// and the orchestrator folds them into a zero-confidence result.

use thiserror::Error;

/// Errors produced by the fingerprinting and matching engine.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The caller supplied input the engine cannot work with: empty text,
    /// a malformed embedding, a non-positive top-K, an out-of-range threshold.
    #[error("validation error: {0}")]
    Validation(String),

    /// A query embedding does not have the index's fixed dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The vector index backend is not loaded or cannot be built here.
    #[error("vector backend not available: {0}")]
    NotAvailable(String),

    /// The persistent store is unreachable or holds data we cannot decode.
    #[error("storage error: {0}")]
    Storage(String),
}

impl MatchError {
    /// True for errors caused by the caller's input rather than by the
    /// engine's environment. These are never swallowed.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            MatchError::Validation(_) | MatchError::DimensionMismatch { .. }
        )
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        MatchError::Validation(msg.into())
    }
}

impl From<rusqlite::Error> for MatchError {
    fn from(e: rusqlite::Error) -> Self {
        MatchError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for MatchError {
    fn from(e: serde_json::Error) -> Self {
        MatchError::Storage(format!("corrupt serialized value: {e}"))
    }
}

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, MatchError>;
