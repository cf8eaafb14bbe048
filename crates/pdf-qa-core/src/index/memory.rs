//! In-memory [`VectorIndex`] implementation for testing and WASM targets.
//!
//! Uses a `HashMap` of namespaces behind `std::sync::RwLock`. Queries are
//! brute-force cosine similarity over every vector in the namespace.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::IndexError;
use crate::models::{ChunkMetadata, DocumentSummary, IndexRecord, Match};
use crate::recency::summarize_sources;

use super::{sort_matches, MetadataFilter, VectorIndex};

struct StoredVector {
    id: String,
    vector: Vec<f32>,
    metadata: ChunkMetadata,
}

/// In-memory index for tests and embedded use.
pub struct InMemoryIndex {
    namespaces: RwLock<HashMap<String, Vec<StoredVector>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
        }
    }

    /// Number of records stored in `namespace`.
    pub fn len(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .expect("index lock poisoned")
            .get(namespace)
            .map(|v| v.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, namespace: &str) -> bool {
        self.len(namespace) == 0
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, namespace: &str, records: &[IndexRecord]) -> Result<(), IndexError> {
        let mut namespaces = self.namespaces.write().expect("index lock poisoned");
        let stored = namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            stored.retain(|sv| sv.id != record.id);
            stored.push(StoredVector {
                id: record.id.clone(),
                vector: record.vector.clone(),
                metadata: record.metadata.clone(),
            });
        }
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Match>, IndexError> {
        let namespaces = self.namespaces.read().expect("index lock poisoned");
        let stored = match namespaces.get(namespace) {
            Some(s) => s,
            None => return Ok(Vec::new()),
        };
        let mut matches: Vec<Match> = stored
            .iter()
            .filter(|sv| filter.map_or(true, |f| f.matches(&sv.metadata.source)))
            .map(|sv| Match {
                id: sv.id.clone(),
                score: cosine_similarity(vector, &sv.vector) as f64,
                metadata: sv.metadata.clone(),
            })
            .collect();
        sort_matches(&mut matches);
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn list_documents(&self, namespace: &str) -> Result<Vec<DocumentSummary>, IndexError> {
        let namespaces = self.namespaces.read().expect("index lock poisoned");
        let stored: Vec<Match> = namespaces
            .get(namespace)
            .map(|stored| {
                stored
                    .iter()
                    .map(|sv| Match {
                        id: sv.id.clone(),
                        score: 0.0,
                        metadata: sv.metadata.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        // same aggregation as the sampling fallback
        Ok(summarize_sources(&stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, source: &str, ts: i64, vector: Vec<f32>) -> IndexRecord {
        IndexRecord {
            id: id.to_string(),
            vector,
            metadata: ChunkMetadata {
                source: source.to_string(),
                timestamp: ts,
                chunk_index: 0,
                text: format!("text of {}", id),
            },
        }
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity() {
        let index = InMemoryIndex::new();
        index
            .upsert(
                "ns",
                &[
                    record("far", "a.pdf", 1, vec![0.0, 1.0]),
                    record("near", "a.pdf", 1, vec![1.0, 0.1]),
                ],
            )
            .await
            .unwrap();
        let matches = index.query("ns", &[1.0, 0.0], 10, None).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "near");
        assert!(matches[0].score > matches[1].score);
    }

    #[tokio::test]
    async fn test_source_filter_and_top_k() {
        let index = InMemoryIndex::new();
        index
            .upsert(
                "ns",
                &[
                    record("a1", "a.pdf", 1, vec![1.0, 0.0]),
                    record("a2", "a.pdf", 1, vec![0.9, 0.1]),
                    record("b1", "b.pdf", 2, vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();
        let filter = MetadataFilter::Source("a.pdf".to_string());
        let matches = index.query("ns", &[1.0, 0.0], 10, Some(&filter)).await.unwrap();
        assert!(matches.iter().all(|m| m.source() == "a.pdf"));
        assert_eq!(matches.len(), 2);

        let top1 = index.query("ns", &[1.0, 0.0], 1, None).await.unwrap();
        assert_eq!(top1.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id_and_namespaces_are_isolated() {
        let index = InMemoryIndex::new();
        index.upsert("ns", &[record("x", "a.pdf", 1, vec![1.0])]).await.unwrap();
        index.upsert("ns", &[record("x", "a.pdf", 5, vec![1.0])]).await.unwrap();
        assert_eq!(index.len("ns"), 1);
        assert!(index.is_empty("other"));
        assert!(index.query("other", &[1.0], 5, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_documents_tracks_latest_timestamp() {
        let index = InMemoryIndex::new();
        index
            .upsert(
                "ns",
                &[
                    record("a1", "a.pdf", 100, vec![1.0]),
                    record("a2", "a.pdf", 300, vec![1.0]),
                    record("b1", "b.pdf", 200, vec![1.0]),
                ],
            )
            .await
            .unwrap();
        let docs = index.list_documents("ns").await.unwrap();
        let a = docs.iter().find(|d| d.source == "a.pdf").unwrap();
        assert_eq!(a.timestamp, 300);
        assert_eq!(a.chunk_count, 2);
        assert_eq!(docs.len(), 2);
    }

    #[tokio::test]
    async fn test_list_documents_skips_records_without_source() {
        let index = InMemoryIndex::new();
        index
            .upsert(
                "ns",
                &[record("a1", "a.pdf", 100, vec![1.0]), record("orphan", "", 900, vec![1.0])],
            )
            .await
            .unwrap();
        let listed = index.list_documents("ns").await.unwrap();
        let sampled = summarize_sources(&index.query("ns", &[1.0], 10, None).await.unwrap());
        assert_eq!(listed, sampled);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].source, "a.pdf");
    }
}
