//! End-to-end orchestrator scenarios over the in-memory index.
//!
//! The fake embedder maps every query to `[1, 0]`, and chunks are stored
//! as `[s, sqrt(1 - s²)]`, so each chunk's similarity score is exactly the
//! `s` it was built with (up to f32 rounding).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pdf_qa_core::corpus::CorpusIndex;
use pdf_qa_core::embedding::Embedder;
use pdf_qa_core::error::{EmbedError, IndexError, SearchError};
use pdf_qa_core::index::memory::InMemoryIndex;
use pdf_qa_core::index::{MetadataFilter, VectorIndex};
use pdf_qa_core::models::{
    ChunkMetadata, DocumentSummary, IndexRecord, Match, QueryKind, SearchOutcome, SearchResult,
    SearchStrategy,
};
use pdf_qa_core::search::{SearchEngine, SearchParams};

const NS: &str = "pdfs";
const HOUR_MS: i64 = 60 * 60 * 1000;
const NOW: i64 = 1_700_000_000_000;

struct FixedEmbedder {
    calls: AtomicUsize,
}

impl FixedEmbedder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Embedder for FixedEmbedder {
    fn model_name(&self) -> &str {
        "fixed"
    }

    fn dims(&self) -> usize {
        2
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }

    fn dims(&self) -> usize {
        2
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Err(EmbedError::Provider("model failed to load".into()))
    }
}

struct DownIndex;

#[async_trait]
impl VectorIndex for DownIndex {
    async fn upsert(&self, _: &str, _: &[IndexRecord]) -> Result<(), IndexError> {
        Err(IndexError::Unavailable("timed out".into()))
    }

    async fn query(
        &self,
        _: &str,
        _: &[f32],
        _: usize,
        _: Option<&MetadataFilter>,
    ) -> Result<Vec<Match>, IndexError> {
        Err(IndexError::Unavailable("timed out".into()))
    }
}

/// Lists documents normally but fails chosen similarity queries.
struct FlakyIndex {
    inner: InMemoryIndex,
    fail_filtered: bool,
    fail_global: bool,
}

#[async_trait]
impl VectorIndex for FlakyIndex {
    async fn upsert(&self, namespace: &str, records: &[IndexRecord]) -> Result<(), IndexError> {
        self.inner.upsert(namespace, records).await
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Match>, IndexError> {
        let fail = if filter.is_some() { self.fail_filtered } else { self.fail_global };
        if fail {
            return Err(IndexError::Unavailable("connection reset".into()));
        }
        self.inner.query(namespace, vector, top_k, filter).await
    }

    async fn list_documents(&self, namespace: &str) -> Result<Vec<DocumentSummary>, IndexError> {
        self.inner.list_documents(namespace).await
    }
}

async fn flaky_engine(fail_filtered: bool, fail_global: bool) -> SearchEngine {
    let inner = InMemoryIndex::new();
    add_document(&inner, "old.pdf", NOW - 10 * HOUR_MS, &[0.4, 0.3]).await;
    add_document(&inner, "report.pdf", NOW - HOUR_MS, &[0.05]).await;
    let index = FlakyIndex {
        inner,
        fail_filtered,
        fail_global,
    };
    let corpus = CorpusIndex::new(Arc::new(index), NS);
    SearchEngine::new(corpus, FixedEmbedder::new(), SearchParams::default()).with_clock(Arc::new(|| NOW))
}

fn assert_index_down(result: &SearchResult) {
    assert_eq!(result.search_strategy, SearchStrategy::NoDocuments);
    assert_eq!(result.outcome, SearchOutcome::NoDocumentsFound);
    assert!(result.index_unavailable);
    assert!(result.matched_chunks.is_empty());
    assert!(result.primary_source.is_none());
    assert!(result.context_message.contains("unavailable"), "got: {}", result.context_message);
}

fn vector_for(score: f32) -> Vec<f32> {
    vec![score, (1.0 - score * score).sqrt()]
}

async fn add_document(index: &InMemoryIndex, source: &str, timestamp: i64, scores: &[f32]) {
    let records: Vec<IndexRecord> = scores
        .iter()
        .enumerate()
        .map(|(i, &s)| IndexRecord {
            id: format!("{}:{}:{}", source, timestamp, i),
            vector: vector_for(s),
            metadata: ChunkMetadata {
                source: source.to_string(),
                timestamp,
                chunk_index: i as i64,
                text: format!("{} passage {}", source, i),
            },
        })
        .collect();
    index.upsert(NS, &records).await.unwrap();
}

fn engine(index: InMemoryIndex, embedder: Arc<dyn Embedder>) -> SearchEngine {
    let corpus = CorpusIndex::new(Arc::new(index), NS);
    SearchEngine::new(corpus, embedder, SearchParams::default()).with_clock(Arc::new(|| NOW))
}

#[tokio::test]
async fn empty_corpus_returns_no_documents_without_embedding() {
    let embedder = FixedEmbedder::new();
    let engine = engine(InMemoryIndex::new(), embedder.clone());

    let result = engine.search("summary").await.unwrap();

    assert_eq!(result.outcome, SearchOutcome::NoDocumentsFound);
    assert_eq!(result.search_strategy, SearchStrategy::NoDocuments);
    assert_eq!(result.query_kind, QueryKind::Generic);
    assert!(result.matched_chunks.is_empty());
    assert!(result.primary_source.is_none());
    assert!(!result.index_unavailable);
    assert!(!result.context_message.is_empty());
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn single_document_with_good_match_is_sufficient() {
    let index = InMemoryIndex::new();
    add_document(&index, "report.pdf", NOW - 3 * HOUR_MS, &[0.4, 0.35, 0.3, 0.15, 0.05]).await;
    let engine = engine(index, FixedEmbedder::new());

    let result = engine.search("what are the key risks").await.unwrap();

    assert_eq!(result.query_kind, QueryKind::Specific);
    assert_eq!(result.search_strategy, SearchStrategy::RecentDocumentSufficient);
    assert_eq!(result.outcome, SearchOutcome::Found);
    assert_eq!(result.primary_source.as_deref(), Some("report.pdf"));
    assert!(!result.matched_chunks.is_empty());
    assert!(result.matched_chunks.iter().all(|c| c.is_primary));
    // 0.05 falls under the minimum relevance score
    assert_eq!(result.matched_chunks.len(), 4);
    assert!(result
        .matched_chunks
        .windows(2)
        .all(|w| w[0].score >= w[1].score));
    assert_eq!(result.matched_chunks[0].text, "report.pdf passage 0");
    assert!(result.context_message.contains("report.pdf"));
    assert_eq!(result.source_breakdown.len(), 1);
    assert_eq!(result.source_breakdown[0].chunks, 4);
}

#[tokio::test]
async fn weak_recent_document_escalates_to_cross_document_search() {
    let index = InMemoryIndex::new();
    add_document(&index, "old.pdf", NOW - 10 * HOUR_MS, &[0.4, 0.3]).await;
    add_document(&index, "new.pdf", NOW - 3 * HOUR_MS, &[0.12, 0.02]).await;
    let engine = engine(index, FixedEmbedder::new());

    let result = engine.search("what is the indemnity cap").await.unwrap();

    assert_eq!(result.search_strategy, SearchStrategy::CrossDocumentSearch);
    assert_eq!(result.outcome, SearchOutcome::Found);
    assert_eq!(result.alternative_sources, vec!["old.pdf".to_string()]);
    assert_eq!(result.primary_source.as_deref(), Some("old.pdf"));
    assert!(result.context_message.contains("new.pdf"));
    assert!(result.context_message.contains("old.pdf"));

    let primary: Vec<_> = result.matched_chunks.iter().filter(|c| c.is_primary).collect();
    assert_eq!(primary.len(), 2);
    assert!(primary.iter().all(|c| c.source == "old.pdf"));
    // old.pdf yields fewer than four chunks, so new.pdf contributes
    let secondary: Vec<_> = result.matched_chunks.iter().filter(|c| !c.is_primary).collect();
    assert_eq!(secondary.len(), 1);
    assert_eq!(secondary[0].source, "new.pdf");
    assert!(result.matched_chunks[0].is_primary);
}

#[tokio::test]
async fn nothing_relevant_anywhere_is_topic_not_found() {
    let index = InMemoryIndex::new();
    add_document(&index, "old.pdf", NOW - 10 * HOUR_MS, &[0.15]).await;
    add_document(&index, "new.pdf", NOW - 3 * HOUR_MS, &[0.1]).await;
    let engine = engine(index, FixedEmbedder::new());

    let result = engine.search("who won the 1998 world cup").await.unwrap();

    assert_eq!(result.search_strategy, SearchStrategy::TopicNotFound);
    assert_eq!(result.outcome, SearchOutcome::NoRelevantMatches);
    assert!(result.matched_chunks.is_empty());
    assert!(result.context_message.contains("new.pdf"));
}

#[tokio::test]
async fn generic_query_uses_only_the_most_recent_document() {
    let index = InMemoryIndex::new();
    add_document(&index, "old.pdf", NOW - 10 * HOUR_MS, &[0.9, 0.8]).await;
    add_document(&index, "new.pdf", NOW - 3 * HOUR_MS, &[0.02, 0.01, 0.03]).await;
    let engine = engine(index, FixedEmbedder::new());

    let result = engine.search("Can I get a Summary?").await.unwrap();

    assert_eq!(result.query_kind, QueryKind::Generic);
    assert_eq!(result.search_strategy, SearchStrategy::RecentDocumentOnly);
    assert_eq!(result.primary_source.as_deref(), Some("new.pdf"));
    assert_eq!(result.matched_chunks.len(), 3);
    assert!(result
        .matched_chunks
        .iter()
        .all(|c| c.source == "new.pdf" && c.is_primary));
    assert!(result.alternative_sources.is_empty());
}

#[tokio::test]
async fn recent_upload_wins_generic_queries_after_new_ingest() {
    let index = InMemoryIndex::new();
    add_document(&index, "a.pdf", NOW - 2 * HOUR_MS, &[0.5]).await;
    add_document(&index, "b.pdf", NOW - 60_000, &[0.5]).await;
    let engine = engine(index, FixedEmbedder::new());

    let result = engine.search("give me an overview").await.unwrap();
    assert_eq!(result.primary_source.as_deref(), Some("b.pdf"));
}

#[tokio::test]
async fn empty_query_is_rejected() {
    let engine = engine(InMemoryIndex::new(), FixedEmbedder::new());
    assert!(matches!(engine.search("   ").await, Err(SearchError::EmptyQuery)));
}

#[tokio::test]
async fn embedding_failure_is_an_error() {
    let index = InMemoryIndex::new();
    add_document(&index, "report.pdf", NOW, &[0.4]).await;
    let engine = engine(index, Arc::new(FailingEmbedder));

    let err = engine.search("what are the key risks").await.unwrap_err();
    assert!(matches!(err, SearchError::Embedding(_)));
}

#[tokio::test]
async fn unavailable_index_is_flagged() {
    let corpus = CorpusIndex::new(Arc::new(DownIndex), NS);
    let engine = SearchEngine::new(corpus, FixedEmbedder::new(), SearchParams::default());

    let result = engine.search("what are the key risks").await.unwrap();

    assert_eq!(result.outcome, SearchOutcome::NoDocumentsFound);
    assert!(result.index_unavailable);
    assert!(result.matched_chunks.is_empty());
}

#[tokio::test]
async fn result_serializes_with_camel_case_fields() {
    let index = InMemoryIndex::new();
    add_document(&index, "report.pdf", NOW - 3 * HOUR_MS, &[0.4]).await;
    let engine = engine(index, FixedEmbedder::new());

    let result = engine.search("what are the key risks").await.unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["searchStrategy"], "recent_document_sufficient");
    assert_eq!(json["primarySource"], "report.pdf");
    assert_eq!(json["matchedChunks"][0]["isPrimary"], true);
    assert_eq!(json["matchedChunks"][0]["chunkIndex"], 0);
    assert!(json["sourceBreakdown"].is_array());
}

#[tokio::test]
async fn failed_queries_after_listing_are_not_reported_as_not_found() {
    let engine = flaky_engine(true, true).await;

    let specific = engine.search("what are the key risks").await.unwrap();
    assert_index_down(&specific);
    assert_eq!(specific.query_kind, QueryKind::Specific);

    let generic = engine.search("give me a summary").await.unwrap();
    assert_index_down(&generic);
    assert_eq!(generic.query_kind, QueryKind::Generic);
}

#[tokio::test]
async fn failed_recent_query_does_not_escalate() {
    // the global query would succeed and find old.pdf
    let engine = flaky_engine(true, false).await;

    let result = engine.search("what are the key risks").await.unwrap();

    assert_index_down(&result);
    assert!(result.alternative_sources.is_empty());
}

#[tokio::test]
async fn failed_global_query_is_not_topic_not_found() {
    let engine = flaky_engine(false, true).await;

    let result = engine.search("what are the key risks").await.unwrap();

    assert_index_down(&result);
}
