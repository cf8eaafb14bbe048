//! Core data models for the retrieval pipeline.
//!
//! These types describe what flows between the vector index, the ranking
//! engine, the chunk selector, and the caller of [`search`](crate::search).
//! All of them are transient per query except [`Chunk`], which is produced
//! once at ingestion and never mutated afterwards.
//!
//! Wire-facing types serialize with `camelCase` field names so the JSON
//! shape matches what browser clients expect (`matchedChunks`,
//! `isPrimary`, `chunkIndex`, ...).

use serde::{Deserialize, Serialize};

/// A contiguous span of extracted text from one document.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Deterministic chunk id (see [`chunk_id`](crate::chunk::chunk_id)).
    pub id: String,
    /// Back-reference to the owning document (its filename).
    pub source: String,
    /// Zero-based position within the document. Contiguous from 0.
    pub chunk_index: i64,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

/// Metadata stored next to every vector in the index.
///
/// Every field is optional on read: records written by older ingestion
/// code (or by hand) may lack some of them. Missing text deserializes to an
/// empty string and is later dropped by the chunk selector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    #[serde(default, alias = "filename")]
    pub source: String,
    /// Ingestion time in Unix milliseconds.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub chunk_index: i64,
    #[serde(default)]
    pub text: String,
}

/// A vector plus metadata, as upserted into the index.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// A single retrieval hit returned by a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    /// Cosine similarity against the query vector. Absent scores read as 0.
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

impl Match {
    pub fn source(&self) -> &str {
        &self.metadata.source
    }

    pub fn text(&self) -> &str {
        &self.metadata.text
    }
}

/// One logical ingested document as seen through the index.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub source: String,
    /// Latest ingestion timestamp observed for this source (Unix ms).
    pub timestamp: i64,
    pub chunk_count: usize,
}

/// Per-document aggregate produced by the ranking engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedSource {
    pub source: String,
    /// Matches for this source, in the order the index returned them.
    pub matches: Vec<Match>,
    pub max_score: f64,
    pub avg_score: f64,
    /// Timestamp of the first match in the group.
    pub timestamp: i64,
    pub match_count: usize,
    pub recency_boost: f64,
    /// `max_score + recency_boost`.
    pub final_score: f64,
}

/// Whether a query asks for a document overview or a specific fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Generic,
    Specific,
}

/// Which retrieval path produced a [`SearchResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// The corpus is empty (or the index could not be reached).
    NoDocuments,
    /// Generic query answered from the most recent document only.
    RecentDocumentOnly,
    /// Specific query; the most recent document scored high enough.
    RecentDocumentSufficient,
    /// Specific query; the most recent document scored between thresholds.
    RecentDocumentModerate,
    /// Specific query escalated to a corpus-wide search that found matches.
    CrossDocumentSearch,
    /// Specific query escalated, but nothing relevant exists anywhere.
    TopicNotFound,
}

impl SearchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStrategy::NoDocuments => "no_documents",
            SearchStrategy::RecentDocumentOnly => "recent_document_only",
            SearchStrategy::RecentDocumentSufficient => "recent_document_sufficient",
            SearchStrategy::RecentDocumentModerate => "recent_document_moderate",
            SearchStrategy::CrossDocumentSearch => "cross_document_search",
            SearchStrategy::TopicNotFound => "topic_not_found",
        }
    }
}

impl std::fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business outcome of a search. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchOutcome {
    /// At least one chunk was selected as context.
    Found,
    /// The corpus holds no documents.
    NoDocumentsFound,
    /// Documents exist but none cleared the relevance filters.
    NoRelevantMatches,
}

/// A chunk chosen as generation context.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedChunk {
    /// Chunk text, verbatim from the index.
    pub text: String,
    pub score: f64,
    pub source: String,
    pub chunk_index: i64,
    pub is_primary: bool,
    /// Length of `text` in characters, for context budgeting.
    pub char_len: usize,
}

/// Per-source summary of what made it into the context.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBreakdown {
    pub source: String,
    pub chunks: usize,
    pub max_score: f64,
    pub avg_score: f64,
    pub recency_boost: f64,
    pub final_score: f64,
    pub is_primary: bool,
}

/// The orchestrator's output contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub query_kind: QueryKind,
    pub matched_chunks: Vec<SelectedChunk>,
    pub primary_source: Option<String>,
    pub search_strategy: SearchStrategy,
    pub outcome: SearchOutcome,
    pub context_message: String,
    pub source_breakdown: Vec<SourceBreakdown>,
    /// Other documents that matched after escalation (cross-document only).
    pub alternative_sources: Vec<String>,
    /// Set when an index call failed during this query.
    pub index_unavailable: bool,
}

impl SearchResult {
    pub fn is_empty(&self) -> bool {
        self.matched_chunks.is_empty()
    }
}
