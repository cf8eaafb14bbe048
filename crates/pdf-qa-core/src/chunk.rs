//! Overlapping character-window text chunker.
//!
//! Splits extracted document text into [`Chunk`]s of at most
//! `chunk_size` characters, where each window after the first begins
//! `chunk_overlap` characters before the end of the previous one. Neighbouring
//! chunks therefore share a little context, which keeps sentences that
//! straddle a boundary retrievable from either side.
//!
//! Each chunk receives a deterministic UUID derived from its document's
//! source, ingestion timestamp and index, plus a SHA-256 hash of its text.
//!
//! # Algorithm
//!
//! 1. Work in characters, not bytes, so multi-byte text never splits a
//!    code point.
//! 2. Take a window of `chunk_size` characters starting at `start`.
//! 3. If the window does not reach the end of the text, pull its end back
//!    to the last whitespace in the window's second half (if any).
//! 4. Trim the window; whitespace-only windows are skipped without
//!    consuming an index.
//! 5. Advance `start` to `end - chunk_overlap`, always making progress.
//!
//! # Example
//!
//! ```rust
//! use pdf_qa_core::chunk::{chunk_text, ChunkingParams};
//!
//! let chunks = chunk_text("report.pdf", 1_700_000_000_000, "Hello world.", &ChunkingParams::default());
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].chunk_index, 0);
//! ```

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;

/// Window size and overlap, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            chunk_size: 400,
            chunk_overlap: 50,
        }
    }
}

/// Split `text` into overlapping chunks.
///
/// # Guarantees
///
/// - Empty or whitespace-only text yields no chunks.
/// - Chunk indices are contiguous: `0, 1, 2, …, N-1`.
/// - No chunk is longer than `chunk_size` characters.
/// - Output is deterministic for the same inputs.
pub fn chunk_text(source: &str, timestamp: i64, text: &str, params: &ChunkingParams) -> Vec<Chunk> {
    let size = params.chunk_size.max(1);
    let overlap = params.chunk_overlap.min(size - 1);

    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    // byte offset of every char position, plus the end of the string
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index: i64 = 0;

    while start < n {
        let mut end = (start + size).min(n);

        if end < n {
            let lower = (start + size / 2).max(start + 1);
            if let Some(ws) = (lower..end).rev().find(|&c| chars[c].is_whitespace()) {
                end = ws;
            }
        }

        let piece = text[offsets[start]..offsets[end]].trim();
        if !piece.is_empty() {
            chunks.push(make_chunk(source, timestamp, index, piece));
            index += 1;
        }

        if end >= n {
            break;
        }

        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }

    chunks
}

/// Deterministic id for the chunk at `index` of one ingestion of `source`.
pub fn chunk_id(source: &str, timestamp: i64, index: i64) -> String {
    let name = format!("{}:{}:{}", source, timestamp, index);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

fn make_chunk(source: &str, timestamp: i64, index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: chunk_id(source, timestamp, index),
        source: source.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}
