//! SQLite-backed [`VectorIndex`].
//!
//! Vectors live in the `vectors` table as little-endian f32 BLOBs next to
//! their chunk metadata. Queries load the namespace's candidate rows and
//! rank them by cosine similarity in Rust, which is fast enough for the
//! few-thousand-chunk corpora a PDF QA deployment holds.
//!
//! [`TimeoutIndex`] bounds every call of a wrapped index so a stalled
//! backend surfaces as [`IndexError::Unavailable`] instead of hanging a
//! request.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::time::Duration;

use pdf_qa_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use pdf_qa_core::error::IndexError;
use pdf_qa_core::index::{sort_matches, MetadataFilter, VectorIndex};
use pdf_qa_core::models::{ChunkMetadata, DocumentSummary, IndexRecord, Match};

pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    /// Wrap a pool whose schema was created by [`crate::migrate`].
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn unavailable(e: sqlx::Error) -> IndexError {
    IndexError::Unavailable(e.to_string())
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert(&self, namespace: &str, records: &[IndexRecord]) -> Result<(), IndexError> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO vectors (id, namespace, source, chunk_index, timestamp, text, embedding, dims)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(namespace, id) DO UPDATE SET
                    source = excluded.source,
                    chunk_index = excluded.chunk_index,
                    timestamp = excluded.timestamp,
                    text = excluded.text,
                    embedding = excluded.embedding,
                    dims = excluded.dims
                "#,
            )
            .bind(&record.id)
            .bind(namespace)
            .bind(&record.metadata.source)
            .bind(record.metadata.chunk_index)
            .bind(record.metadata.timestamp)
            .bind(&record.metadata.text)
            .bind(vec_to_blob(&record.vector))
            .bind(record.vector.len() as i64)
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;
        }

        tx.commit().await.map_err(unavailable)?;
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Match>, IndexError> {
        let rows = match filter {
            Some(MetadataFilter::Source(source)) => sqlx::query(
                "SELECT id, source, chunk_index, timestamp, text, embedding FROM vectors WHERE namespace = ? AND source = ?",
            )
            .bind(namespace)
            .bind(source)
            .fetch_all(&self.pool)
            .await,
            None => sqlx::query(
                "SELECT id, source, chunk_index, timestamp, text, embedding FROM vectors WHERE namespace = ?",
            )
            .bind(namespace)
            .fetch_all(&self.pool)
            .await,
        }
        .map_err(unavailable)?;

        let mut matches: Vec<Match> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let stored = blob_to_vec(&blob);
                Match {
                    id: row.get("id"),
                    score: cosine_similarity(vector, &stored) as f64,
                    metadata: ChunkMetadata {
                        source: row.get("source"),
                        timestamp: row.get("timestamp"),
                        chunk_index: row.get("chunk_index"),
                        text: row.get("text"),
                    },
                }
            })
            .collect();

        sort_matches(&mut matches);
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn list_documents(&self, namespace: &str) -> Result<Vec<DocumentSummary>, IndexError> {
        let rows = sqlx::query(
            r#"
            SELECT source, MAX(timestamp) AS latest, COUNT(*) AS chunks
            FROM vectors
            WHERE namespace = ?
            GROUP BY source
            ORDER BY latest DESC, source ASC
            "#,
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(rows
            .iter()
            .map(|row| {
                let chunks: i64 = row.get("chunks");
                DocumentSummary {
                    source: row.get("source"),
                    timestamp: row.get("latest"),
                    chunk_count: chunks as usize,
                }
            })
            .collect())
    }
}

/// Applies a deadline to every call of the wrapped index.
pub struct TimeoutIndex<I> {
    inner: I,
    timeout: Duration,
}

impl<I: VectorIndex> TimeoutIndex<I> {
    pub fn new(inner: I, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, IndexError>
    where
        F: std::future::Future<Output = Result<T, IndexError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(op, timeout_ms = self.timeout.as_millis() as u64, "Index call timed out");
                Err(IndexError::Unavailable(format!(
                    "{} timed out after {} ms",
                    op,
                    self.timeout.as_millis()
                )))
            }
        }
    }
}

#[async_trait]
impl<I: VectorIndex> VectorIndex for TimeoutIndex<I> {
    async fn upsert(&self, namespace: &str, records: &[IndexRecord]) -> Result<(), IndexError> {
        self.bounded("upsert", self.inner.upsert(namespace, records))
            .await
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Match>, IndexError> {
        self.bounded("query", self.inner.query(namespace, vector, top_k, filter))
            .await
    }

    async fn list_documents(&self, namespace: &str) -> Result<Vec<DocumentSummary>, IndexError> {
        self.bounded("list_documents", self.inner.list_documents(namespace))
            .await
    }
}
