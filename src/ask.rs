//! Question answering: search, budget the context, generate.

use anyhow::Result;
use serde::Serialize;

use pdf_qa_core::context::build_context;
use pdf_qa_core::models::SearchResult;

use crate::generate::render_prompt;
use crate::services::Services;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub answer: String,
    pub search: SearchResult,
    /// Characters of context sent to the generator (0 when none was).
    pub context_chars: usize,
}

/// Answer `query` from the corpus.
///
/// When retrieval selects nothing, the search's explanatory message is the
/// answer and the generator is not called.
pub async fn ask(services: &Services, query: &str) -> Result<AskResponse> {
    let search = services.engine.search(query).await?;

    if search.matched_chunks.is_empty() {
        return Ok(AskResponse {
            answer: search.context_message.clone(),
            search,
            context_chars: 0,
        });
    }

    let budget = services.engine.params().limits.max_total_chars;
    let context = build_context(&search.matched_chunks, budget);
    let context_chars = context.text.chars().count();
    let prompt = render_prompt(&context.text, query);

    tracing::info!(
        strategy = %search.search_strategy,
        chunks = context.included,
        dropped = context.dropped,
        context_chars,
        model = services.generator.model_name(),
        "Generating answer"
    );
    let answer = services.generator.generate(&prompt).await?;

    Ok(AskResponse {
        answer,
        search,
        context_chars,
    })
}

/// `pdfqa ask <query>`.
pub async fn run_ask(services: &Services, query: &str, json: bool) -> Result<()> {
    let response = ask(services, query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{}", response.answer);
    if !response.search.matched_chunks.is_empty() {
        println!();
        println!("Sources ({}):", response.search.search_strategy);
        for source in &response.search.source_breakdown {
            println!(
                "  {} ({} chunks, best score {:.2}{})",
                source.source,
                source.chunks,
                source.max_score,
                if source.is_primary { ", primary" } else { "" }
            );
        }
    }
    Ok(())
}
