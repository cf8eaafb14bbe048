use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use pdf_qa_core::chunk::ChunkingParams;
use pdf_qa_core::ranking::RankingParams;
use pdf_qa_core::search::SearchParams;
use pdf_qa_core::select::SelectionLimits;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Index namespace all documents are stored under.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    "pdfs".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn to_params(&self) -> ChunkingParams {
        ChunkingParams {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }
}

fn default_chunk_size() -> usize {
    400
}
fn default_chunk_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_min_relevance")]
    pub min_relevance_score: f64,
    #[serde(default = "default_context_search")]
    pub context_search_threshold: f64,
    #[serde(default = "default_primary_threshold")]
    pub primary_threshold: f64,
    #[serde(default = "default_primary_chunks")]
    pub max_chunks_per_primary: usize,
    #[serde(default = "default_generic_chunks")]
    pub max_chunks_generic: usize,
    #[serde(default = "default_secondary_chunks")]
    pub max_chunks_per_secondary: usize,
    #[serde(default = "default_max_total_chunks")]
    pub max_total_chunks: usize,
    #[serde(default = "default_max_total_chars")]
    pub max_total_chars: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_sample_top_k")]
    pub sample_top_k: usize,
    #[serde(default = "default_near_tie")]
    pub near_tie: f64,
    #[serde(default = "default_index_timeout_ms")]
    pub index_timeout_ms: u64,
    /// Extra phrases that mark a query as a request for an overview.
    #[serde(default)]
    pub generic_phrases: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_relevance_score: default_min_relevance(),
            context_search_threshold: default_context_search(),
            primary_threshold: default_primary_threshold(),
            max_chunks_per_primary: default_primary_chunks(),
            max_chunks_generic: default_generic_chunks(),
            max_chunks_per_secondary: default_secondary_chunks(),
            max_total_chunks: default_max_total_chunks(),
            max_total_chars: default_max_total_chars(),
            top_k: default_top_k(),
            sample_top_k: default_sample_top_k(),
            near_tie: default_near_tie(),
            index_timeout_ms: default_index_timeout_ms(),
            generic_phrases: Vec::new(),
        }
    }
}

impl RetrievalConfig {
    pub fn to_params(&self) -> SearchParams {
        SearchParams {
            min_relevance_score: self.min_relevance_score,
            context_search_threshold: self.context_search_threshold,
            primary_threshold: self.primary_threshold,
            top_k: self.top_k,
            sample_top_k: self.sample_top_k,
            ranking: RankingParams {
                near_tie: self.near_tie,
                ..RankingParams::default()
            },
            limits: SelectionLimits {
                max_chunks_per_primary: self.max_chunks_per_primary,
                max_chunks_generic: self.max_chunks_generic,
                max_chunks_per_secondary: self.max_chunks_per_secondary,
                max_total_chunks: self.max_total_chunks,
                max_total_chars: self.max_total_chars,
                ..SelectionLimits::default()
            },
        }
    }
}

fn default_min_relevance() -> f64 {
    0.1
}
fn default_context_search() -> f64 {
    0.25
}
fn default_primary_threshold() -> f64 {
    0.2
}
fn default_primary_chunks() -> usize {
    8
}
fn default_generic_chunks() -> usize {
    10
}
fn default_secondary_chunks() -> usize {
    2
}
fn default_max_total_chunks() -> usize {
    10
}
fn default_max_total_chars() -> usize {
    12_000
}
fn default_top_k() -> usize {
    20
}
fn default_sample_top_k() -> usize {
    1000
}
fn default_near_tie() -> f64 {
    0.05
}
fn default_index_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the `ollama` provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL for the `ollama` provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            temperature: default_temperature(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_temperature() -> f32 {
    0.2
}
fn default_generation_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `pdf_qa=debug,info`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_max_file_bytes() -> usize {
    50 * 1024 * 1024
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a TOML config document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be smaller than chunking.chunk_size");
    }

    // Validate retrieval
    let r = &config.retrieval;
    for (name, value) in [
        ("min_relevance_score", r.min_relevance_score),
        ("context_search_threshold", r.context_search_threshold),
        ("primary_threshold", r.primary_threshold),
        ("near_tie", r.near_tie),
    ] {
        if !(0.0..=1.0).contains(&value) {
            anyhow::bail!("retrieval.{} must be in [0.0, 1.0]", name);
        }
    }
    if r.min_relevance_score > r.primary_threshold || r.min_relevance_score > r.context_search_threshold {
        anyhow::bail!(
            "retrieval.min_relevance_score must not exceed primary_threshold or context_search_threshold"
        );
    }
    for (name, value) in [
        ("max_chunks_per_primary", r.max_chunks_per_primary),
        ("max_chunks_generic", r.max_chunks_generic),
        ("max_total_chunks", r.max_total_chunks),
        ("max_total_chars", r.max_total_chars),
        ("top_k", r.top_k),
        ("sample_top_k", r.sample_top_k),
    ] {
        if value == 0 {
            anyhow::bail!("retrieval.{} must be >= 1", name);
        }
    }

    // Validate embedding
    let e = &config.embedding;
    match e.provider.as_str() {
        "disabled" | "hash" | "local" => {}
        "openai" | "ollama" => {
            if e.dims.is_none() || e.dims == Some(0) {
                anyhow::bail!("embedding.dims must be > 0 when provider is '{}'", e.provider);
            }
            if e.model.is_none() {
                anyhow::bail!("embedding.model must be specified when provider is '{}'", e.provider);
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, hash, openai, ollama, or local.",
            other
        ),
    }
    if e.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if e.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be >= 1");
    }

    // Validate generation
    match config.generation.provider.as_str() {
        "disabled" => {}
        "openai" | "ollama" => {
            if config.generation.model.is_none() {
                anyhow::bail!(
                    "generation.model must be specified when provider is '{}'",
                    config.generation.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    if config.ingest.max_file_bytes == 0 {
        anyhow::bail!("ingest.max_file_bytes must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[db]
path = "./data/pdfqa.sqlite"

[server]
bind = "127.0.0.1:7331"
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.db.namespace, "pdfs");
        assert_eq!(config.chunking.chunk_size, 400);
        assert_eq!(config.chunking.chunk_overlap, 50);
        assert_eq!(config.embedding.provider, "disabled");
        assert_eq!(config.generation.provider, "disabled");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.ingest.max_file_bytes, 50 * 1024 * 1024);

        let params = config.retrieval.to_params();
        assert_eq!(params, SearchParams::default());
    }

    #[test]
    fn test_retrieval_overrides_reach_params() {
        let toml = format!(
            "{}\n[retrieval]\nmin_relevance_score = 0.15\nmax_chunks_per_primary = 10\nnear_tie = 0.02\n",
            MINIMAL
        );
        let params = parse_config(&toml).unwrap().retrieval.to_params();
        assert_eq!(params.min_relevance_score, 0.15);
        assert_eq!(params.limits.max_chunks_per_primary, 10);
        assert_eq!(params.ranking.near_tie, 0.02);
    }

    #[test]
    fn test_rejects_overlap_not_below_size() {
        let toml = format!("{}\n[chunking]\nchunk_size = 100\nchunk_overlap = 100\n", MINIMAL);
        assert!(parse_config(&toml).is_err());
    }

    #[test]
    fn test_rejects_min_relevance_above_thresholds() {
        let toml = format!("{}\n[retrieval]\nmin_relevance_score = 0.3\n", MINIMAL);
        assert!(parse_config(&toml).is_err());
    }

    #[test]
    fn test_network_provider_requires_model_and_dims() {
        let toml = format!("{}\n[embedding]\nprovider = \"openai\"\n", MINIMAL);
        let err = parse_config(&toml).unwrap_err().to_string();
        assert!(err.contains("embedding.dims"));
    }

    #[test]
    fn test_unknown_provider() {
        let toml = format!("{}\n[embedding]\nprovider = \"magic\"\n", MINIMAL);
        assert!(parse_config(&toml).is_err());
    }

    #[test]
    fn test_example_config_parses() {
        let config = parse_config(include_str!("../config/pdfqa.example.toml")).unwrap();
        assert_eq!(config.embedding.provider, "local");
        assert_eq!(config.retrieval.to_params(), SearchParams::default());
    }
}
