//! Error taxonomy for the retrieval core.
//!
//! Library code returns [`RagError`]; the CLI boundary wraps it with
//! `anyhow` context. The variants deliberately separate caller-retryable
//! failures (`ModelUnavailable`, `GenerationUnavailable`, `Timeout`) from
//! configuration and index-state failures (`InvalidConfig`,
//! `VersionMismatch`) that a retry cannot fix.

use thiserror::Error;

/// Errors surfaced by the retrieval core.
#[derive(Debug, Error)]
pub enum RagError {
    /// Bad chunking/retrieval parameters, rejected before any I/O.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The embedding backend cannot be reached or loaded.
    /// Recoverable by caller retry.
    #[error("embedding backend unavailable: {0}")]
    ModelUnavailable(String),

    /// The generation service cannot be reached. Distinct from retrieval
    /// errors; the caller owns retry policy.
    #[error("generation service unavailable: {0}")]
    GenerationUnavailable(String),

    /// Index and query were embedded with different model versions.
    /// Fatal for the query; the index must be re-embedded.
    #[error("model version mismatch: index has '{index}', query has '{query}'")]
    VersionMismatch { index: String, query: String },

    /// A bounded wait was exceeded. The caller may retry with backoff.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// The named document or collection does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage-layer failure (SQLite).
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, RagError>;
