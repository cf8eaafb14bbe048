//! `pdfqa documents`: list ingested documents, newest first.

use anyhow::{bail, Result};

use pdf_qa_core::models::DocumentSummary;
use pdf_qa_core::recency::resolve_most_recent;

use crate::services::Services;

/// Documents known to the index, newest first.
pub async fn list_documents(services: &Services) -> Result<Vec<DocumentSummary>> {
    let outcome = resolve_most_recent(services.engine.corpus(), services.embedder.dims()).await;
    if outcome.index_unavailable {
        bail!("vector index unavailable");
    }
    let mut documents = outcome.documents;
    documents.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(a.source.cmp(&b.source)));
    Ok(documents)
}

pub async fn run_documents(services: &Services) -> Result<()> {
    let documents = list_documents(services).await?;

    if documents.is_empty() {
        println!("No documents.");
        return Ok(());
    }

    println!("{:<40} {:>8}  UPLOADED", "SOURCE", "CHUNKS");
    for doc in &documents {
        let uploaded = chrono::DateTime::from_timestamp_millis(doc.timestamp)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("{:<40} {:>8}  {}", doc.source, doc.chunk_count, uploaded);
    }
    Ok(())
}
