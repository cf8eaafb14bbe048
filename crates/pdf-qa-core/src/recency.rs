//! Recency resolver: which document was uploaded last?
//!
//! Every chunk carries its document's ingestion timestamp. The most recent
//! document is the source with the globally maximum timestamp. Ties keep
//! the first source encountered; upload timestamps are millisecond
//! resolution, so collisions are rare in practice.

use crate::corpus::CorpusIndex;
use crate::models::{DocumentSummary, Match};

/// Result of resolving the most recent document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecencyOutcome {
    pub most_recent: Option<DocumentSummary>,
    /// Every document seen while resolving.
    pub documents: Vec<DocumentSummary>,
    /// The index could not be reached; `most_recent` is `None`.
    pub index_unavailable: bool,
}

/// Aggregate matches into per-source summaries, in first-seen order.
///
/// Each summary holds the maximum timestamp seen for its source and the
/// number of matches from it.
pub fn summarize_sources(matches: &[Match]) -> Vec<DocumentSummary> {
    let mut docs: Vec<DocumentSummary> = Vec::new();
    for m in matches {
        let source = m.source();
        if source.is_empty() {
            continue;
        }
        match docs.iter_mut().find(|d| d.source == source) {
            Some(doc) => {
                doc.chunk_count += 1;
                doc.timestamp = doc.timestamp.max(m.metadata.timestamp);
            }
            None => docs.push(DocumentSummary {
                source: source.to_string(),
                timestamp: m.metadata.timestamp,
                chunk_count: 1,
            }),
        }
    }
    docs
}

/// The document with the greatest timestamp, or `None` for an empty corpus.
pub fn most_recent_document(documents: &[DocumentSummary]) -> Option<&DocumentSummary> {
    let mut best: Option<&DocumentSummary> = None;
    for doc in documents {
        match best {
            Some(b) if doc.timestamp <= b.timestamp => {}
            _ => best = Some(doc),
        }
    }
    best
}

/// Resolve the most recent document through the corpus accessor.
///
/// `dims` sizes the zero-vector probe used when the backend cannot list
/// documents directly.
pub async fn resolve_most_recent(corpus: &CorpusIndex, dims: usize) -> RecencyOutcome {
    let listing = corpus.list_documents(dims).await;
    let most_recent = most_recent_document(&listing.documents).cloned();
    RecencyOutcome {
        most_recent,
        documents: listing.documents,
        index_unavailable: listing.unavailable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn doc(source: &str, timestamp: i64) -> DocumentSummary {
        DocumentSummary {
            source: source.to_string(),
            timestamp,
            chunk_count: 1,
        }
    }

    fn hit(source: &str, timestamp: i64) -> Match {
        Match {
            id: format!("{}-{}", source, timestamp),
            score: 0.0,
            metadata: ChunkMetadata {
                source: source.to_string(),
                timestamp,
                chunk_index: 0,
                text: String::new(),
            },
        }
    }

    #[test]
    fn test_picks_max_timestamp_regardless_of_order() {
        let orders = [
            vec![doc("a", 100), doc("b", 200), doc("c", 50)],
            vec![doc("c", 50), doc("a", 100), doc("b", 200)],
            vec![doc("b", 200), doc("c", 50), doc("a", 100)],
        ];
        for docs in &orders {
            assert_eq!(most_recent_document(docs).unwrap().source, "b");
        }
    }

    #[test]
    fn test_empty_corpus() {
        assert!(most_recent_document(&[]).is_none());
    }

    #[test]
    fn test_tie_keeps_first_encountered() {
        let docs = vec![doc("first", 10), doc("second", 10)];
        assert_eq!(most_recent_document(&docs).unwrap().source, "first");
    }

    #[test]
    fn test_summarize_sources_uses_max_timestamp() {
        let matches = vec![hit("a", 100), hit("b", 200), hit("a", 300), hit("", 999)];
        let docs = summarize_sources(&matches);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source, "a");
        assert_eq!(docs[0].timestamp, 300);
        assert_eq!(docs[0].chunk_count, 2);
        assert_eq!(most_recent_document(&docs).unwrap().source, "a");
    }
}
