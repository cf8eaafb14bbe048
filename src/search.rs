//! `pdfqa search`: run the retrieval engine and print what it selected.

use anyhow::Result;

use pdf_qa_core::models::SearchResult;

use crate::services::Services;

pub async fn run_search(services: &Services, query: &str, json: bool) -> Result<()> {
    let result = services.engine.search(query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_result(&result);
    Ok(())
}

fn print_result(result: &SearchResult) {
    println!("strategy: {}", result.search_strategy);
    println!("query: {:?}", result.query_kind);
    if let Some(ref primary) = result.primary_source {
        println!("primary: {}", primary);
    }
    if !result.alternative_sources.is_empty() {
        println!("also in: {}", result.alternative_sources.join(", "));
    }
    if result.index_unavailable {
        println!("warning: index was unavailable during this search");
    }
    println!("{}", result.context_message);
    println!();

    if result.matched_chunks.is_empty() {
        println!("No results.");
        return;
    }

    for (i, chunk) in result.matched_chunks.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} / chunk {}{}",
            i + 1,
            chunk.score,
            chunk.source,
            chunk.chunk_index,
            if chunk.is_primary { "" } else { " (secondary)" }
        );
        println!("    excerpt: \"{}\"", excerpt(&chunk.text, 240));
        println!();
    }
}

/// First `max_chars` characters of `text` on one line.
fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let trimmed = flat.trim();
    if trimmed.chars().count() <= max_chars {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_flattens_and_truncates() {
        assert_eq!(excerpt(" a\nb ", 10), "a b");
        assert_eq!(excerpt("abcdef", 3), "abc...");
        assert_eq!(excerpt("ééé", 2), "éé...");
    }
}
