//! Search strategy orchestrator.
//!
//! [`SearchEngine::search`] drives one query through a fixed sequence of
//! phases:
//!
//! ```text
//! Start → Classified → RecencyResolved → {GenericSearch | SpecificSearch}
//!       → [EscalatedSearch] → Selected → Done
//! ```
//!
//! # Strategy decisions
//!
//! | Situation | Strategy |
//! |-----------|----------|
//! | Corpus empty | `no_documents` |
//! | Generic query | `recent_document_only` (never escalates) |
//! | Specific, recent doc best ≥ `primary_threshold` | `recent_document_sufficient` |
//! | Specific, recent doc best < `context_search_threshold`, global best > `primary_threshold` | `cross_document_search` |
//! | Specific, escalated, nothing above `primary_threshold` | `topic_not_found` |
//! | Specific, recent doc best in between | `recent_document_moderate` |
//!
//! "Not found" outcomes are ordinary [`SearchResult`]s with a descriptive
//! `context_message`. Only an empty query and embedding failures are errors.

use std::sync::Arc;

use crate::classify::QueryClassifier;
use crate::corpus::CorpusIndex;
use crate::embedding::Embedder;
use crate::error::SearchError;
use crate::models::{
    Match, QueryKind, RankedSource, SearchOutcome, SearchResult, SearchStrategy, SelectedChunk,
    SourceBreakdown,
};
use crate::ranking::{group_by_source, rank, RankingParams};
use crate::recency::resolve_most_recent;
use crate::select::{select, SelectionLimits};

/// Retrieval policy. Every threshold is configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    /// Matches scoring below this are discarded before ranking on the
    /// specific-query paths.
    pub min_relevance_score: f64,
    /// Below this, a specific query escalates to a corpus-wide search.
    pub context_search_threshold: f64,
    /// At or above this, the most recent document alone is sufficient.
    pub primary_threshold: f64,
    /// Matches requested per similarity query.
    pub top_k: usize,
    /// Matches requested when sampling the corpus for recency.
    pub sample_top_k: usize,
    pub ranking: RankingParams,
    pub limits: SelectionLimits,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            min_relevance_score: 0.1,
            context_search_threshold: 0.25,
            primary_threshold: 0.2,
            top_k: 20,
            sample_top_k: 1000,
            ranking: RankingParams::default(),
            limits: SelectionLimits::default(),
        }
    }
}

/// Phases of one query lifecycle, logged as they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Start,
    Classified,
    RecencyResolved,
    GenericSearch,
    SpecificSearch,
    EscalatedSearch,
    Selected,
    Done,
}

/// How a specific query treats the most recent document's best score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecentDecision {
    Sufficient,
    Moderate,
    Escalate,
}

/// Classify the most recent document's best score for a specific query.
pub fn decide_recent(best_score: f64, params: &SearchParams) -> RecentDecision {
    if best_score >= params.primary_threshold {
        RecentDecision::Sufficient
    } else if best_score < params.context_search_threshold {
        RecentDecision::Escalate
    } else {
        RecentDecision::Moderate
    }
}

/// Clock returning Unix milliseconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp_millis())
}

/// Matches accepted for selection, plus how they were obtained.
struct Accepted {
    strategy: SearchStrategy,
    matches: Vec<Match>,
    alternative_sources: Vec<String>,
    index_unavailable: bool,
}

/// Stateless query orchestrator. Cheap to clone and safe to share.
#[derive(Clone)]
pub struct SearchEngine {
    corpus: CorpusIndex,
    embedder: Arc<dyn Embedder>,
    classifier: QueryClassifier,
    params: SearchParams,
    clock: Clock,
}

impl SearchEngine {
    pub fn new(corpus: CorpusIndex, embedder: Arc<dyn Embedder>, params: SearchParams) -> Self {
        let corpus = corpus.with_top_k(params.top_k, params.sample_top_k);
        Self {
            corpus,
            embedder,
            classifier: QueryClassifier::new(),
            params,
            clock: system_clock(),
        }
    }

    pub fn with_classifier(mut self, classifier: QueryClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Replace the clock used for recency boosts.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    pub fn corpus(&self) -> &CorpusIndex {
        &self.corpus
    }

    /// Run one query end to end.
    pub async fn search(&self, query: &str) -> Result<SearchResult, SearchError> {
        let query = query.trim();
        enter(SearchPhase::Start);
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let kind = self.classifier.classify(query);
        enter(SearchPhase::Classified);
        tracing::info!(query_kind = ?kind, "Query classified");

        let recency = resolve_most_recent(&self.corpus, self.embedder.dims()).await;
        enter(SearchPhase::RecencyResolved);
        let Some(recent) = recency.most_recent else {
            if recency.index_unavailable {
                tracing::warn!("Index unavailable while resolving the most recent document");
            } else {
                tracing::info!("Corpus is empty");
            }
            return Ok(no_documents(kind, recency.index_unavailable));
        };
        let recent = recent.source;
        tracing::info!(most_recent = %recent, documents = recency.documents.len(), "Most recent document resolved");

        let embedding = self.embedder.embed(query).await?;

        let accepted = match kind {
            QueryKind::Generic => {
                enter(SearchPhase::GenericSearch);
                let outcome = self.corpus.query_filtered(&embedding, None, &recent).await;
                if outcome.unavailable {
                    return Ok(index_down(kind));
                }
                if outcome.matches.is_empty() {
                    let message = format!(
                        "Nothing relevant was found in the most recent document \"{}\".",
                        recent
                    );
                    return Ok(self.finish_empty(
                        kind,
                        SearchStrategy::RecentDocumentOnly,
                        message,
                        outcome.unavailable,
                    ));
                }
                Accepted {
                    strategy: SearchStrategy::RecentDocumentOnly,
                    matches: outcome.matches,
                    alternative_sources: Vec::new(),
                    index_unavailable: outcome.unavailable,
                }
            }
            QueryKind::Specific => {
                enter(SearchPhase::SpecificSearch);
                match self.specific(&embedding, &recent, kind).await {
                    Ok(accepted) => accepted,
                    Err(terminal) => return Ok(terminal),
                }
            }
        };

        let now = (self.clock)();
        let ranked = rank(group_by_source(&accepted.matches), now, &self.params.ranking);
        let selected = select(&ranked, kind, &self.params.limits);
        enter(SearchPhase::Selected);
        tracing::info!(
            strategy = %accepted.strategy,
            sources = ranked.len(),
            chunks = selected.len(),
            "Chunks selected"
        );

        if selected.is_empty() {
            let message = format!(
                "Matches were found but none had usable text (most recent document: \"{}\").",
                recent
            );
            return Ok(self.finish_empty(kind, accepted.strategy, message, accepted.index_unavailable));
        }

        let primary_source = ranked.first().map(|r| r.source.clone());
        let context_message = context_message(
            accepted.strategy,
            &recent,
            primary_source.as_deref(),
            &accepted.alternative_sources,
        );
        let result = SearchResult {
            query_kind: kind,
            source_breakdown: breakdown(&ranked, &selected),
            matched_chunks: selected,
            primary_source,
            search_strategy: accepted.strategy,
            outcome: SearchOutcome::Found,
            context_message,
            alternative_sources: accepted.alternative_sources,
            index_unavailable: accepted.index_unavailable,
        };
        enter(SearchPhase::Done);
        Ok(result)
    }

    /// Specific-query path. `Err` carries a terminal result.
    async fn specific(
        &self,
        embedding: &[f32],
        recent: &str,
        kind: QueryKind,
    ) -> Result<Accepted, SearchResult> {
        let outcome = self.corpus.query_filtered(embedding, None, recent).await;
        // a failed call scores 0; never escalate on it
        if outcome.unavailable {
            return Err(index_down(kind));
        }
        let best = outcome.best_score();
        let decision = decide_recent(best, &self.params);
        tracing::info!(best_score = best, decision = ?decision, "Scored most recent document");

        match decision {
            RecentDecision::Sufficient | RecentDecision::Moderate => {
                let strategy = if decision == RecentDecision::Sufficient {
                    SearchStrategy::RecentDocumentSufficient
                } else {
                    SearchStrategy::RecentDocumentModerate
                };
                Ok(Accepted {
                    strategy,
                    matches: self.relevant(outcome.matches),
                    alternative_sources: Vec::new(),
                    index_unavailable: outcome.unavailable,
                })
            }
            RecentDecision::Escalate => {
                enter(SearchPhase::EscalatedSearch);
                let global = self.corpus.query_global(embedding, None).await;
                if global.unavailable {
                    return Err(index_down(kind));
                }
                let unavailable = outcome.unavailable;
                let best_global = global.best_score();
                tracing::info!(best_global_score = best_global, "Escalated to corpus-wide search");

                if best_global > self.params.primary_threshold {
                    let alternative_sources =
                        alternative_sources(&global.matches, recent, self.params.primary_threshold);
                    Ok(Accepted {
                        strategy: SearchStrategy::CrossDocumentSearch,
                        matches: self.relevant(global.matches),
                        alternative_sources,
                        index_unavailable: unavailable,
                    })
                } else {
                    let message = format!(
                        "No information about this topic was found in the most recent document \"{}\" or in any other uploaded document.",
                        recent
                    );
                    Err(self.finish_empty(kind, SearchStrategy::TopicNotFound, message, unavailable))
                }
            }
        }
    }

    /// Drop near-zero noise matches.
    fn relevant(&self, matches: Vec<Match>) -> Vec<Match> {
        matches
            .into_iter()
            .filter(|m| m.score >= self.params.min_relevance_score)
            .collect()
    }

    fn finish_empty(
        &self,
        kind: QueryKind,
        strategy: SearchStrategy,
        context_message: String,
        index_unavailable: bool,
    ) -> SearchResult {
        if index_unavailable {
            tracing::warn!(strategy = %strategy, "Index unavailable; result may be incomplete");
        }
        tracing::info!(strategy = %strategy, "No relevant matches");
        enter(SearchPhase::Done);
        SearchResult {
            query_kind: kind,
            matched_chunks: Vec::new(),
            primary_source: None,
            search_strategy: strategy,
            outcome: SearchOutcome::NoRelevantMatches,
            context_message,
            source_breakdown: Vec::new(),
            alternative_sources: Vec::new(),
            index_unavailable,
        }
    }
}

fn enter(phase: SearchPhase) {
    tracing::debug!(phase = ?phase, "Search phase");
}

fn no_documents(kind: QueryKind, index_unavailable: bool) -> SearchResult {
    let context_message = if index_unavailable {
        "The document index is currently unavailable, so no documents could be searched.".to_string()
    } else {
        "No documents have been uploaded yet. Upload a PDF to ask questions about it.".to_string()
    };
    enter(SearchPhase::Done);
    SearchResult {
        query_kind: kind,
        matched_chunks: Vec::new(),
        primary_source: None,
        search_strategy: SearchStrategy::NoDocuments,
        outcome: SearchOutcome::NoDocumentsFound,
        context_message,
        source_breakdown: Vec::new(),
        alternative_sources: Vec::new(),
        index_unavailable,
    }
}

/// Terminal result for a similarity query that failed after the corpus
/// was listed: reported like an unreachable index, never as "not found".
fn index_down(kind: QueryKind) -> SearchResult {
    tracing::warn!("Index unavailable during similarity query; search aborted");
    no_documents(kind, true)
}

/// Sources other than `recent` with a match above `threshold`, deduplicated
/// in descending-score order.
pub fn alternative_sources(matches: &[Match], recent: &str, threshold: f64) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for m in matches.iter().filter(|m| m.score > threshold) {
        let source = m.source();
        if source.is_empty() || source == recent || sources.iter().any(|s| s == source) {
            continue;
        }
        sources.push(source.to_string());
    }
    sources
}

fn context_message(
    strategy: SearchStrategy,
    recent: &str,
    primary: Option<&str>,
    alternatives: &[String],
) -> String {
    match strategy {
        SearchStrategy::RecentDocumentOnly => format!(
            "Answering from the most recent document \"{}\".",
            recent
        ),
        SearchStrategy::RecentDocumentSufficient => format!(
            "Found relevant information in the most recent document \"{}\".",
            recent
        ),
        SearchStrategy::RecentDocumentModerate => format!(
            "Found partially relevant information in the most recent document \"{}\".",
            recent
        ),
        SearchStrategy::CrossDocumentSearch if primary == Some(recent) => {
            if alternatives.is_empty() {
                format!(
                    "Found relevant information in the most recent document \"{}\".",
                    recent
                )
            } else {
                format!(
                    "Found relevant information in the most recent document \"{}\" combined with {}.",
                    recent,
                    quoted(alternatives)
                )
            }
        }
        SearchStrategy::CrossDocumentSearch => {
            let found_in = if alternatives.is_empty() {
                primary.unwrap_or(recent).to_string()
            } else {
                quoted(alternatives)
            };
            format!(
                "The most recent document \"{}\" does not appear to cover this topic. Found relevant information in {}.",
                recent, found_in
            )
        }
        SearchStrategy::TopicNotFound | SearchStrategy::NoDocuments => String::new(),
    }
}

fn quoted(sources: &[String]) -> String {
    sources
        .iter()
        .map(|s| format!("\"{}\"", s))
        .collect::<Vec<_>>()
        .join(", ")
}

fn breakdown(ranked: &[RankedSource], selected: &[SelectedChunk]) -> Vec<SourceBreakdown> {
    ranked
        .iter()
        .filter_map(|r| {
            let chunks = selected.iter().filter(|c| c.source == r.source).count();
            if chunks == 0 {
                return None;
            }
            Some(SourceBreakdown {
                source: r.source.clone(),
                chunks,
                max_score: r.max_score,
                avg_score: r.avg_score,
                recency_boost: r.recency_boost,
                final_score: r.final_score,
                is_primary: selected
                    .iter()
                    .any(|c| c.source == r.source && c.is_primary),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn hit(source: &str, score: f64) -> Match {
        Match {
            id: format!("{}-{}", source, score),
            score,
            metadata: ChunkMetadata {
                source: source.to_string(),
                timestamp: 0,
                chunk_index: 0,
                text: "t".to_string(),
            },
        }
    }

    #[test]
    fn test_decide_recent() {
        let p = SearchParams::default();
        assert_eq!(decide_recent(0.4, &p), RecentDecision::Sufficient);
        assert_eq!(decide_recent(0.2, &p), RecentDecision::Sufficient);
        assert_eq!(decide_recent(0.1, &p), RecentDecision::Escalate);
        assert_eq!(decide_recent(0.0, &p), RecentDecision::Escalate);
    }

    #[test]
    fn test_moderate_band_when_thresholds_are_inverted() {
        let p = SearchParams {
            primary_threshold: 0.3,
            context_search_threshold: 0.25,
            ..SearchParams::default()
        };
        assert_eq!(decide_recent(0.27, &p), RecentDecision::Moderate);
        assert_eq!(decide_recent(0.31, &p), RecentDecision::Sufficient);
        assert_eq!(decide_recent(0.2, &p), RecentDecision::Escalate);
    }

    #[test]
    fn test_alternative_sources_dedup_and_exclude_recent() {
        let matches = vec![
            hit("old.pdf", 0.5),
            hit("new.pdf", 0.45),
            hit("old.pdf", 0.4),
            hit("mid.pdf", 0.3),
            hit("low.pdf", 0.2),
        ];
        assert_eq!(
            alternative_sources(&matches, "new.pdf", 0.2),
            vec!["old.pdf".to_string(), "mid.pdf".to_string()]
        );
    }

    #[test]
    fn test_cross_document_message_names_both() {
        let msg = context_message(
            SearchStrategy::CrossDocumentSearch,
            "new.pdf",
            Some("old.pdf"),
            &["old.pdf".to_string()],
        );
        assert!(msg.contains("new.pdf"));
        assert!(msg.contains("old.pdf"));
    }

    #[test]
    fn test_cross_document_message_when_recent_ranks_first() {
        let msg = context_message(
            SearchStrategy::CrossDocumentSearch,
            "new.pdf",
            Some("new.pdf"),
            &["old.pdf".to_string()],
        );
        assert!(!msg.contains("does not appear to cover"));
        assert!(msg.contains("\"new.pdf\" combined with \"old.pdf\""));

        let alone = context_message(SearchStrategy::CrossDocumentSearch, "new.pdf", Some("new.pdf"), &[]);
        assert_eq!(alone, "Found relevant information in the most recent document \"new.pdf\".");
    }
}
