//! Retrieval error types.

use thiserror::Error;

/// Errors raised while consulting a similarity store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    /// The store could not be reached or failed to answer.
    #[error("Similarity store '{store}' unavailable: {reason}")]
    StoreUnavailable {
        /// Store name.
        store: String,
        /// Failure description.
        reason: String,
    },

    /// The web search backend failed.
    #[error("Web search via '{backend}' failed: {reason}")]
    WebSearchFailed {
        /// Backend name.
        backend: String,
        /// Failure description.
        reason: String,
    },
}

/// Result type for retrieval operations.
pub type RetrievalResult<T> = Result<T, RetrievalError>;
