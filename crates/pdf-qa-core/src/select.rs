//! Chunk selector: turns ranked sources into a bounded, ordered context set.
//!
//! # Generic queries
//!
//! Only the top-ranked source is used. Up to `max_chunks_generic` of its
//! chunks are taken in descending score order, all marked primary.
//!
//! # Specific queries
//!
//! 1. Primary source = top-ranked. Keep chunks scoring above
//!    `min(max_score × primary_ratio, primary_floor)`, capped at
//!    `max_chunks_per_primary`.
//! 2. If fewer than `secondary_trigger` chunks were kept and a second source
//!    exists, keep its chunks scoring above
//!    `min(max_score × secondary_ratio, secondary_floor)`, capped at
//!    `max_chunks_per_secondary`, marked non-primary.
//! 3. Primary chunks come first, then secondary; each group by score desc.
//!
//! Chunks with empty text are dropped silently in both modes. The total is
//! capped at `max_total_chunks`.

use crate::models::{Match, QueryKind, RankedSource, SelectedChunk};

/// Quotas and thresholds for chunk selection.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionLimits {
    pub max_chunks_per_primary: usize,
    pub max_chunks_generic: usize,
    pub max_chunks_per_secondary: usize,
    pub max_total_chunks: usize,
    /// Character budget for the rendered context (see [`crate::context`]).
    pub max_total_chars: usize,
    pub primary_ratio: f64,
    pub primary_floor: f64,
    pub secondary_ratio: f64,
    pub secondary_floor: f64,
    /// A secondary source is consulted only below this many primary chunks.
    pub secondary_trigger: usize,
}

impl Default for SelectionLimits {
    fn default() -> Self {
        Self {
            max_chunks_per_primary: 8,
            max_chunks_generic: 10,
            max_chunks_per_secondary: 2,
            max_total_chunks: 10,
            max_total_chars: 12_000,
            primary_ratio: 0.7,
            primary_floor: 0.05,
            secondary_ratio: 0.8,
            secondary_floor: 0.08,
            secondary_trigger: 4,
        }
    }
}

impl SelectionLimits {
    pub fn primary_threshold(&self, max_score: f64) -> f64 {
        (max_score * self.primary_ratio).min(self.primary_floor)
    }

    pub fn secondary_threshold(&self, max_score: f64) -> f64 {
        (max_score * self.secondary_ratio).min(self.secondary_floor)
    }
}

/// Select context chunks from ranked sources.
///
/// Pure and deterministic: the same input always yields the same output.
pub fn select(ranked: &[RankedSource], kind: QueryKind, limits: &SelectionLimits) -> Vec<SelectedChunk> {
    let Some(primary) = ranked.first() else {
        return Vec::new();
    };

    let mut selected = match kind {
        QueryKind::Generic => take_chunks(primary, f64::NEG_INFINITY, limits.max_chunks_generic, true),
        QueryKind::Specific => {
            let threshold = limits.primary_threshold(primary.max_score);
            let mut chunks = take_chunks(primary, threshold, limits.max_chunks_per_primary, true);
            if chunks.len() < limits.secondary_trigger {
                if let Some(secondary) = ranked.get(1) {
                    let threshold = limits.secondary_threshold(secondary.max_score);
                    chunks.extend(take_chunks(
                        secondary,
                        threshold,
                        limits.max_chunks_per_secondary,
                        false,
                    ));
                }
            }
            chunks
        }
    };

    selected.truncate(limits.max_total_chunks);
    selected
}

/// Chunks of `source` scoring strictly above `threshold`, best first.
fn take_chunks(source: &RankedSource, threshold: f64, cap: usize, is_primary: bool) -> Vec<SelectedChunk> {
    let mut candidates: Vec<&Match> = source
        .matches
        .iter()
        .filter(|m| !m.text().trim().is_empty())
        .filter(|m| m.score > threshold)
        .collect();

    let dropped = source.matches.iter().filter(|m| m.text().trim().is_empty()).count();
    if dropped > 0 {
        tracing::debug!(source = %source.source, dropped, "Dropped chunks with empty text");
    }

    // stable: equal scores keep index order
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates
        .into_iter()
        .take(cap)
        .map(|m| SelectedChunk {
            text: m.metadata.text.clone(),
            score: m.score,
            source: source.source.clone(),
            chunk_index: m.metadata.chunk_index,
            is_primary,
            char_len: m.metadata.text.chars().count(),
        })
        .collect()
}
