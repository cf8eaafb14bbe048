//! Explicitly constructed service graph.
//!
//! One [`Services`] value owns the vector index, the embedder, the
//! generator, and the search engine built on top of them. CLI commands and
//! the HTTP server build it once from [`Config`] and pass it down; tests
//! assemble it from fakes with [`Services::from_parts`].

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use pdf_qa_core::classify::QueryClassifier;
use pdf_qa_core::corpus::CorpusIndex;
use pdf_qa_core::embedding::Embedder;
use pdf_qa_core::index::VectorIndex;
use pdf_qa_core::search::SearchEngine;

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::generate::{create_generator, Generator};
use crate::migrate;
use crate::sqlite_index::{SqliteIndex, TimeoutIndex};

#[derive(Clone)]
pub struct Services {
    pub config: Arc<Config>,
    pub index: Arc<dyn VectorIndex>,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
    pub engine: SearchEngine,
}

impl Services {
    /// Open the configured database (creating the schema if needed) and
    /// instantiate the configured providers.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;

        let timeout = Duration::from_millis(config.retrieval.index_timeout_ms);
        let index: Arc<dyn VectorIndex> = Arc::new(TimeoutIndex::new(SqliteIndex::new(pool), timeout));
        if !config.embedding.is_enabled() {
            tracing::warn!("Embedding provider is disabled; ingest and search will fail");
        }
        let embedder = create_embedder(&config.embedding)?;
        let generator = create_generator(&config.generation)?;

        Ok(Self::from_parts(config.clone(), index, embedder, generator))
    }

    pub fn from_parts(
        config: Config,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let corpus = CorpusIndex::new(Arc::clone(&index), config.db.namespace.clone());
        let classifier = QueryClassifier::new().extend(&config.retrieval.generic_phrases);
        let engine = SearchEngine::new(corpus, Arc::clone(&embedder), config.retrieval.to_params())
            .with_classifier(classifier);

        Self {
            config: Arc::new(config),
            index,
            embedder,
            generator,
            engine,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.config.db.namespace
    }
}
