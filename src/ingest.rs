//! Upload pipeline: validate → extract → chunk → embed → upsert.
//!
//! Every chunk of one upload shares the upload's timestamp, which is what
//! the recency resolver later uses to find the newest document. Uploading
//! a file under a name that already exists adds a second, newer chunk set
//! under the same source; nothing is merged or overwritten.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use pdf_qa_core::chunk::chunk_text;
use pdf_qa_core::models::{ChunkMetadata, IndexRecord};

use crate::embedding::embed_in_batches;
use crate::extract::{extract_pdf_text, validate_pdf, ExtractError};
use crate::services::Services;

/// Summary of one ingested PDF.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub source: String,
    /// Upload time in Unix milliseconds, shared by all chunks.
    pub timestamp: i64,
    pub chunk_count: usize,
    /// Characters of extracted text.
    pub chars: usize,
}

/// Ingest one PDF given as raw bytes under `filename`.
pub async fn ingest_pdf(services: &Services, filename: &str, bytes: &[u8]) -> Result<IngestReport> {
    let timestamp = chrono::Utc::now().timestamp_millis();
    ingest_pdf_at(services, filename, bytes, timestamp).await
}

/// Like [`ingest_pdf`] with an explicit upload timestamp.
pub async fn ingest_pdf_at(
    services: &Services,
    filename: &str,
    bytes: &[u8],
    timestamp: i64,
) -> Result<IngestReport> {
    let config = &services.config;
    validate_pdf(filename, bytes, config.ingest.max_file_bytes)?;

    // pdf-extract is CPU-bound and can panic on malformed input
    let owned = bytes.to_vec();
    let text = tokio::task::spawn_blocking(move || extract_pdf_text(&owned))
        .await
        .map_err(|e| ExtractError::Pdf(format!("extractor crashed: {}", e)))??;
    ingest_text(services, filename, &text, timestamp).await
}

/// Chunk, embed, and store already-extracted text.
pub async fn ingest_text(
    services: &Services,
    source: &str,
    text: &str,
    timestamp: i64,
) -> Result<IngestReport> {
    let config = &services.config;
    let chunks = chunk_text(source, timestamp, text, &config.chunking.to_params());
    if chunks.is_empty() {
        return Err(ExtractError::NoText(source.to_string()).into());
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embed_in_batches(services.embedder.as_ref(), &texts, config.embedding.batch_size)
        .await
        .with_context(|| format!("Failed to embed chunks of {}", source))?;

    let records: Vec<IndexRecord> = chunks
        .into_iter()
        .zip(vectors)
        .map(|(chunk, vector)| IndexRecord {
            id: chunk.id,
            vector,
            metadata: ChunkMetadata {
                source: chunk.source,
                timestamp,
                chunk_index: chunk.chunk_index,
                text: chunk.text,
            },
        })
        .collect();

    services
        .index
        .upsert(services.namespace(), &records)
        .await
        .with_context(|| format!("Failed to store chunks of {}", source))?;

    let report = IngestReport {
        source: source.to_string(),
        timestamp,
        chunk_count: records.len(),
        chars: text.chars().count(),
    };
    tracing::info!(
        source = %report.source,
        chunks = report.chunk_count,
        chars = report.chars,
        timestamp = report.timestamp,
        "Document ingested"
    );
    Ok(report)
}

/// `pdfqa ingest <files...>`: ingest each file, reporting per-file results.
///
/// A failing file does not stop the others; the command fails at the end
/// if any file failed.
pub async fn run_ingest(services: &Services, files: &[impl AsRef<Path>]) -> Result<()> {
    let mut failed = 0usize;

    for path in files {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let result = match std::fs::read(path) {
            Ok(bytes) => ingest_pdf(services, &filename, &bytes).await,
            Err(e) => Err(anyhow::Error::new(e).context(format!("Failed to read {}", path.display()))),
        };

        match result {
            Ok(report) => println!(
                "ingested {} ({} chunks, {} chars)",
                report.source, report.chunk_count, report.chars
            ),
            Err(e) => {
                failed += 1;
                tracing::warn!(file = %path.display(), error = %e, "Ingest failed");
                eprintln!("failed {}: {:#}", filename, e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} files failed to ingest", failed, files.len());
    }
    println!("ok");
    Ok(())
}
