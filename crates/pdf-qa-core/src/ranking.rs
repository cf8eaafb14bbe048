//! Multi-document ranking with a recency boost.
//!
//! Groups of matches (one group per source document) are scored as
//! `final = max_score + recency_boost`, where the boost is a step function of
//! the document's age. Documents are then ordered by final score, except that
//! two documents whose final scores are within `near_tie` of each other are
//! ordered newest first: when relevance is comparable, freshness wins.
//!
//! # Recency boost schedule (defaults)
//!
//! | Age | Boost |
//! |-----|-------|
//! | < 5 min | +0.20 |
//! | < 30 min | +0.10 |
//! | < 120 min | +0.05 |
//! | otherwise | +0.00 |

use crate::models::{Match, RankedSource};

/// Absorbs float noise in the near-tie comparison (0.55 - 0.50 > 0.05 in f64).
const TIE_EPSILON: f64 = 1e-9;

const MS_PER_MINUTE: f64 = 60_000.0;

/// One step of the recency schedule: documents younger than `max_age_minutes`
/// receive `boost`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecencyStep {
    pub max_age_minutes: f64,
    pub boost: f64,
}

/// Ranking policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingParams {
    /// Steps in ascending `max_age_minutes` order; first matching step wins.
    pub recency_steps: Vec<RecencyStep>,
    /// Final scores closer than this are ordered by timestamp instead.
    pub near_tie: f64,
}

impl Default for RankingParams {
    fn default() -> Self {
        Self {
            recency_steps: vec![
                RecencyStep {
                    max_age_minutes: 5.0,
                    boost: 0.20,
                },
                RecencyStep {
                    max_age_minutes: 30.0,
                    boost: 0.10,
                },
                RecencyStep {
                    max_age_minutes: 120.0,
                    boost: 0.05,
                },
            ],
            near_tie: 0.05,
        }
    }
}

impl RankingParams {
    /// Boost for a document of the given age.
    pub fn recency_boost(&self, age_minutes: f64) -> f64 {
        self.recency_steps
            .iter()
            .find(|step| age_minutes < step.max_age_minutes)
            .map(|step| step.boost)
            .unwrap_or(0.0)
    }
}

/// Group matches by source, keeping first-seen source order and the
/// original match order within each group.
pub fn group_by_source(matches: &[Match]) -> Vec<(String, Vec<Match>)> {
    let mut groups: Vec<(String, Vec<Match>)> = Vec::new();
    for m in matches {
        match groups.iter_mut().find(|(source, _)| source == m.source()) {
            Some((_, group)) => group.push(m.clone()),
            None => groups.push((m.source().to_string(), vec![m.clone()])),
        }
    }
    groups
}

/// Score one source's match group. Returns `None` for an empty group.
pub fn score_source(
    source: String,
    matches: Vec<Match>,
    now_ms: i64,
    params: &RankingParams,
) -> Option<RankedSource> {
    let first = matches.first()?;
    let timestamp = first.metadata.timestamp;
    let match_count = matches.len();
    let max_score = matches
        .iter()
        .map(|m| m.score)
        .fold(f64::NEG_INFINITY, f64::max);
    let avg_score = matches.iter().map(|m| m.score).sum::<f64>() / match_count as f64;
    let age_minutes = (now_ms - timestamp) as f64 / MS_PER_MINUTE;
    let recency_boost = params.recency_boost(age_minutes);

    Some(RankedSource {
        source,
        matches,
        max_score,
        avg_score,
        timestamp,
        match_count,
        recency_boost,
        final_score: max_score + recency_boost,
    })
}

/// Rank per-document match groups.
///
/// Empty groups are skipped. Output order is deterministic for the same
/// input order.
pub fn rank<I>(groups: I, now_ms: i64, params: &RankingParams) -> Vec<RankedSource>
where
    I: IntoIterator<Item = (String, Vec<Match>)>,
{
    let mut ranked: Vec<RankedSource> = groups
        .into_iter()
        .filter_map(|(source, matches)| score_source(source, matches, now_ms, params))
        .collect();
    order_sources(&mut ranked, params.near_tie);

    for (position, r) in ranked.iter().enumerate() {
        tracing::debug!(
            position,
            source = %r.source,
            max_score = r.max_score,
            recency_boost = r.recency_boost,
            final_score = r.final_score,
            "Ranked source"
        );
    }
    ranked
}

/// `true` if `a` belongs before `b`.
fn precedes(a: &RankedSource, b: &RankedSource, near_tie: f64) -> bool {
    if (a.final_score - b.final_score).abs() <= near_tie + TIE_EPSILON {
        a.timestamp > b.timestamp
    } else {
        a.final_score > b.final_score
    }
}

/// Order sources with the near-tie rule.
///
/// The near-tie relation is not transitive, so this is an insertion sort
/// rather than `sort_by`: each source moves ahead only past neighbours it
/// strictly precedes, which is stable and always terminates.
fn order_sources(ranked: &mut [RankedSource], near_tie: f64) {
    for i in 1..ranked.len() {
        let mut j = i;
        while j > 0 && precedes(&ranked[j], &ranked[j - 1], near_tie) {
            ranked.swap(j, j - 1);
            j -= 1;
        }
    }
}
