//! Corpus index accessor.
//!
//! Thin wrapper over a [`VectorIndex`] bound to one namespace. It shapes the
//! source filter, defaults `top_k`, and turns collaborator failures into an
//! [`IndexOutcome`] flagged `unavailable` instead of a raw transport error,
//! so the orchestrator can keep going and report the condition.

use std::sync::Arc;

use crate::error::IndexError;
use crate::index::{MetadataFilter, VectorIndex};
use crate::models::{DocumentSummary, Match};
use crate::recency::summarize_sources;

/// Matches returned by one accessor call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexOutcome {
    pub matches: Vec<Match>,
    /// The index call failed; `matches` is empty.
    pub unavailable: bool,
}

impl IndexOutcome {
    fn unavailable() -> Self {
        Self {
            matches: Vec::new(),
            unavailable: true,
        }
    }

    /// Highest score among the matches, or 0 when empty.
    pub fn best_score(&self) -> f64 {
        self.matches
            .iter()
            .map(|m| m.score)
            .fold(0.0, f64::max)
    }
}

/// Documents known to the index, or a flag saying the index was unreachable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentListing {
    pub documents: Vec<DocumentSummary>,
    pub unavailable: bool,
}

/// Namespace-bound view over a vector index.
#[derive(Clone)]
pub struct CorpusIndex {
    index: Arc<dyn VectorIndex>,
    namespace: String,
    default_top_k: usize,
    sample_top_k: usize,
}

impl CorpusIndex {
    pub fn new(index: Arc<dyn VectorIndex>, namespace: impl Into<String>) -> Self {
        Self {
            index,
            namespace: namespace.into(),
            default_top_k: 20,
            sample_top_k: 1000,
        }
    }

    pub fn with_top_k(mut self, default_top_k: usize, sample_top_k: usize) -> Self {
        self.default_top_k = default_top_k.max(1);
        self.sample_top_k = sample_top_k.max(1);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Corpus-wide similarity query.
    pub async fn query_global(&self, embedding: &[f32], top_k: Option<usize>) -> IndexOutcome {
        let top_k = top_k.unwrap_or(self.default_top_k);
        self.run_query(embedding, top_k, None).await
    }

    /// Similarity query restricted to chunks of one document.
    pub async fn query_filtered(
        &self,
        embedding: &[f32],
        top_k: Option<usize>,
        source: &str,
    ) -> IndexOutcome {
        let top_k = top_k.unwrap_or(self.default_top_k);
        let filter = MetadataFilter::Source(source.to_string());
        self.run_query(embedding, top_k, Some(&filter)).await
    }

    /// List documents with their latest ingestion timestamp.
    ///
    /// Uses the backend's listing when it has one; otherwise samples the
    /// corpus with a broad query against a zero vector of `dims` components
    /// and aggregates the sources it sees.
    pub async fn list_documents(&self, dims: usize) -> DocumentListing {
        match self.index.list_documents(&self.namespace).await {
            Ok(documents) => DocumentListing {
                documents,
                unavailable: false,
            },
            Err(IndexError::Unsupported) => {
                let probe = vec![0.0f32; dims.max(1)];
                let sample = self.run_query(&probe, self.sample_top_k, None).await;
                DocumentListing {
                    documents: summarize_sources(&sample.matches),
                    unavailable: sample.unavailable,
                }
            }
            Err(e) => {
                tracing::warn!(namespace = %self.namespace, error = %e, "Index unavailable while listing documents");
                DocumentListing {
                    documents: Vec::new(),
                    unavailable: true,
                }
            }
        }
    }

    async fn run_query(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> IndexOutcome {
        match self
            .index
            .query(&self.namespace, embedding, top_k, filter)
            .await
        {
            Ok(matches) => IndexOutcome {
                matches,
                unavailable: false,
            },
            Err(e) => {
                tracing::warn!(
                    namespace = %self.namespace,
                    filter = ?filter,
                    error = %e,
                    "Index unavailable during similarity query"
                );
                IndexOutcome::unavailable()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::memory::InMemoryIndex;
    use crate::models::{ChunkMetadata, IndexRecord};
    use async_trait::async_trait;

    struct BrokenIndex;

    #[async_trait]
    impl VectorIndex for BrokenIndex {
        async fn upsert(&self, _: &str, _: &[IndexRecord]) -> Result<(), IndexError> {
            Err(IndexError::Unavailable("connection refused".into()))
        }
        async fn query(
            &self,
            _: &str,
            _: &[f32],
            _: usize,
            _: Option<&MetadataFilter>,
        ) -> Result<Vec<Match>, IndexError> {
            Err(IndexError::Unavailable("connection refused".into()))
        }
    }

    /// Index without a listing, to exercise the sampling fallback.
    struct NoListing(InMemoryIndex);

    #[async_trait]
    impl VectorIndex for NoListing {
        async fn upsert(&self, ns: &str, records: &[IndexRecord]) -> Result<(), IndexError> {
            self.0.upsert(ns, records).await
        }
        async fn query(
            &self,
            ns: &str,
            v: &[f32],
            k: usize,
            f: Option<&MetadataFilter>,
        ) -> Result<Vec<Match>, IndexError> {
            self.0.query(ns, v, k, f).await
        }
    }

    fn record(id: &str, source: &str, ts: i64) -> IndexRecord {
        IndexRecord {
            id: id.to_string(),
            vector: vec![1.0, 0.0],
            metadata: ChunkMetadata {
                source: source.to_string(),
                timestamp: ts,
                chunk_index: 0,
                text: "t".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_failures_become_unavailable_outcomes() {
        let corpus = CorpusIndex::new(Arc::new(BrokenIndex), "ns");
        let global = corpus.query_global(&[1.0], None).await;
        assert!(global.unavailable);
        assert!(global.matches.is_empty());
        assert_eq!(global.best_score(), 0.0);

        let listing = corpus.list_documents(2).await;
        assert!(listing.unavailable);
        assert!(listing.documents.is_empty());
    }

    #[tokio::test]
    async fn test_filtered_query_only_returns_requested_source() {
        let index = InMemoryIndex::new();
        index
            .upsert("ns", &[record("a", "a.pdf", 1), record("b", "b.pdf", 2)])
            .await
            .unwrap();
        let corpus = CorpusIndex::new(Arc::new(index), "ns");
        let outcome = corpus.query_filtered(&[1.0, 0.0], None, "b.pdf").await;
        assert!(!outcome.unavailable);
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].source(), "b.pdf");
    }

    #[tokio::test]
    async fn test_listing_falls_back_to_sampling() {
        let inner = InMemoryIndex::new();
        inner
            .upsert(
                "ns",
                &[record("a", "a.pdf", 10), record("b", "b.pdf", 20), record("c", "b.pdf", 30)],
            )
            .await
            .unwrap();
        let corpus = CorpusIndex::new(Arc::new(NoListing(inner)), "ns");
        let listing = corpus.list_documents(2).await;
        assert!(!listing.unavailable);
        assert_eq!(listing.documents.len(), 2);
        let b = listing.documents.iter().find(|d| d.source == "b.pdf").unwrap();
        assert_eq!(b.timestamp, 30);
        assert_eq!(b.chunk_count, 2);
    }
}
