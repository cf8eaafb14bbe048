//! Error types for the retrieval core.
//!
//! "Nothing relevant" is never an error here: empty corpora and empty match
//! sets come back as normal [`SearchResult`](crate::models::SearchResult)s.
//! The types below cover genuine failures only.

/// Failure of the embedding collaborator.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("cannot embed empty text")]
    EmptyInput,
    #[error("embedding provider is disabled")]
    Disabled,
    #[error("embedding provider error: {0}")]
    Provider(String),
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },
}

/// Failure of the vector-index collaborator.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Transport failure, timeout, or malformed response.
    #[error("vector index unavailable: {0}")]
    Unavailable(String),
    /// The backend cannot list documents; callers fall back to sampling.
    #[error("operation not supported by this index")]
    Unsupported,
}

/// Errors surfaced to callers of [`SearchEngine::search`](crate::search::SearchEngine::search).
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("query must not be empty")]
    EmptyQuery,
    #[error("failed to embed query: {0}")]
    Embedding(#[from] EmbedError),
}
