//! Renders selected chunks into the context string handed to the generator.

use crate::models::SelectedChunk;

const SEPARATOR: &str = "\n\n";

/// Context text plus bookkeeping about what fit the budget.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuiltContext {
    pub text: String,
    /// Number of leading chunks included.
    pub included: usize,
    /// Number of trailing chunks dropped to stay within budget.
    pub dropped: usize,
}

fn render(chunk: &SelectedChunk) -> String {
    format!(
        "[Source: {}, chunk {}]\n{}",
        chunk.source, chunk.chunk_index, chunk.text
    )
}

/// Concatenate chunks in priority order until `max_total_chars` is reached.
///
/// Chunks are dropped from the end (lowest priority first). If even the
/// first chunk does not fit, it is truncated on a char boundary so that a
/// non-empty selection always yields some context.
pub fn build_context(selected: &[SelectedChunk], max_total_chars: usize) -> BuiltContext {
    let mut text = String::new();
    let mut used = 0usize;
    let mut included = 0usize;

    for chunk in selected {
        let block = render(chunk);
        let block_len = block.chars().count();
        let sep_len = if included == 0 { 0 } else { SEPARATOR.len() };

        if used + sep_len + block_len > max_total_chars {
            if included == 0 && max_total_chars > 0 {
                text = block.chars().take(max_total_chars).collect();
                included = 1;
            }
            break;
        }

        if included > 0 {
            text.push_str(SEPARATOR);
        }
        text.push_str(&block);
        used += sep_len + block_len;
        included += 1;
    }

    let dropped = selected.len() - included;
    if dropped > 0 {
        tracing::debug!(included, dropped, max_total_chars, "Context budget reached");
    }

    BuiltContext {
        text,
        included,
        dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source: &str, index: i64, text: &str) -> SelectedChunk {
        SelectedChunk {
            text: text.to_string(),
            score: 0.5,
            source: source.to_string(),
            chunk_index: index,
            is_primary: true,
            char_len: text.chars().count(),
        }
    }

    #[test]
    fn test_format_and_order() {
        let ctx = build_context(&[chunk("a.pdf", 0, "alpha"), chunk("b.pdf", 3, "beta")], 10_000);
        assert_eq!(
            ctx.text,
            "[Source: a.pdf, chunk 0]\nalpha\n\n[Source: b.pdf, chunk 3]\nbeta"
        );
        assert_eq!(ctx.included, 2);
        assert_eq!(ctx.dropped, 0);
    }

    #[test]
    fn test_drops_lowest_priority_first() {
        let chunks = vec![
            chunk("a.pdf", 0, &"x".repeat(50)),
            chunk("a.pdf", 1, &"y".repeat(50)),
            chunk("a.pdf", 2, &"z".repeat(50)),
        ];
        // header is 24 chars, so each block is 75
        let ctx = build_context(&chunks, 160);
        assert_eq!(ctx.included, 2);
        assert_eq!(ctx.dropped, 1);
        assert!(ctx.text.contains("chunk 1"));
        assert!(!ctx.text.contains("chunk 2"));
        assert!(ctx.text.chars().count() <= 160);
    }

    #[test]
    fn test_oversized_first_chunk_is_truncated() {
        let ctx = build_context(&[chunk("a.pdf", 0, &"é".repeat(100))], 40);
        assert_eq!(ctx.included, 1);
        assert_eq!(ctx.text.chars().count(), 40);
    }

    #[test]
    fn test_empty_selection() {
        let ctx = build_context(&[], 100);
        assert!(ctx.text.is_empty());
        assert_eq!(ctx.included, 0);
    }
}
