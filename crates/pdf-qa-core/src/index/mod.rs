//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait defines the storage operations the retrieval
//! core needs: upserting embedded chunks into a namespace and querying by
//! vector with an optional metadata filter. Backends are pluggable (SQLite
//! in the app crate, [`memory::InMemoryIndex`] for tests).
//!
//! Implementations must be `Send + Sync` to work with async runtimes and
//! must be safe for concurrent reads.

pub mod memory;

use async_trait::async_trait;

use crate::error::IndexError;
use crate::models::{DocumentSummary, IndexRecord, Match};

/// Metadata predicate applied by the index during a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataFilter {
    /// Only chunks whose `source` equals this document name.
    Source(String),
}

impl MetadataFilter {
    pub fn matches(&self, source: &str) -> bool {
        match self {
            MetadataFilter::Source(name) => name == source,
        }
    }
}

/// Abstract vector index backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorIndex::upsert) | Insert or replace `(id, vector, metadata)` records |
/// | [`query`](VectorIndex::query) | Nearest neighbours by cosine similarity, descending |
/// | [`list_documents`](VectorIndex::list_documents) | Per-source freshness listing, if supported |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace records in `namespace`, keyed by record id.
    async fn upsert(&self, namespace: &str, records: &[IndexRecord]) -> Result<(), IndexError>;

    /// Return up to `top_k` matches ordered by descending score.
    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Match>, IndexError>;

    /// List every document in `namespace` with its latest timestamp.
    ///
    /// Backends without a cheap listing keep the default, and callers fall
    /// back to sampling via a broad query.
    async fn list_documents(&self, _namespace: &str) -> Result<Vec<DocumentSummary>, IndexError> {
        Err(IndexError::Unsupported)
    }
}

/// Sort matches by score (desc), breaking ties by id for determinism.
pub fn sort_matches(matches: &mut [Match]) {
    matches.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.id.cmp(&b.id))
    });
}
