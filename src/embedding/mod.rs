//! Embedding providers.
//!
//! Every provider implements the core [`Embedder`] trait and returns
//! L2-normalised vectors, so cosine similarity in the index reduces to a
//! dot product:
//! - **[`DisabledEmbedder`]**: returns errors; used when embeddings are not configured.
//! - **`hash`**: the core's FNV-1a n-gram [`HashEmbedder`]; offline and deterministic.
//! - **[`OpenAIEmbedder`]**: calls the OpenAI embeddings API with retry and backoff.
//! - **[`OllamaEmbedder`]**: calls a local Ollama instance's `/api/embed` endpoint.
//! - **[`LocalEmbedder`]**: runs models locally via fastembed; no network calls after model download.
//!
//! # Provider Selection
//!
//! Use [`create_embedder`] to instantiate the appropriate provider based
//! on the configuration:
//!
//! ```rust,no_run
//! # use pdf_qa::config::EmbeddingConfig;
//! # use pdf_qa::embedding::create_embedder;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.model_name(), "disabled");
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use pdf_qa_core::embedding::{l2_normalize, Embedder, HashEmbedder};
use pdf_qa_core::error::EmbedError;

use crate::config::EmbeddingConfig;
use crate::retry;

const DEFAULT_HASH_DIMS: usize = 256;
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

// ============ Disabled ============

/// An embedder that always fails.
///
/// Used when `embedding.provider = "disabled"`. Search surfaces the failure
/// as an embedding error rather than an empty result.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Err(EmbedError::Disabled)
    }
}

// ============ OpenAI ============

/// Embedder using `POST https://api.openai.com/v1/embeddings`.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model,
            dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = retry::send_json(
            || {
                self.client
                    .post("https://api.openai.com/v1/embeddings")
                    .bearer_auth(&self.api_key)
                    .json(&body)
            },
            self.max_retries,
            "OpenAI",
        )
        .await
        .map_err(provider_error)?;

        finish(parse_openai_response(&json)?, texts.len(), self.dims)
    }
}

/// Extract `data[].embedding`, ordered by `data[].index` when present.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, EmbedError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| EmbedError::Provider("Invalid OpenAI response: missing data array".into()))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| EmbedError::Provider("Invalid OpenAI response: missing embedding".into()))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, to_f32(embedding)));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama ============

/// Embedder using a local Ollama instance's `POST /api/embed`.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            model,
            dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let endpoint = format!("{}/api/embed", self.url);
        let json = retry::send_json(
            || self.client.post(&endpoint).json(&body),
            self.max_retries,
            "Ollama",
        )
        .await
        .map_err(provider_error)?;

        finish(parse_ollama_response(&json)?, texts.len(), self.dims)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, EmbedError> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            EmbedError::Provider("Invalid Ollama response: missing embeddings array".into())
        })?;

    embeddings
        .iter()
        .map(|embedding| {
            embedding.as_array().map(|v| to_f32(v)).ok_or_else(|| {
                EmbedError::Provider("Invalid Ollama response: embedding is not an array".into())
            })
        })
        .collect()
}

// ============ Local (fastembed) ============

/// Embedder running a model locally via fastembed.
///
/// The model is downloaded from Hugging Face on first use, cached, and
/// kept loaded for the lifetime of the embedder.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalEmbedder {
    model_name: String,
    model: fastembed::EmbeddingModel,
    dims: usize,
    batch_size: usize,
    loaded: Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| "all-minilm-l6-v2".to_string());
        let model = fastembed_model(&model_name)?;
        let dims = config.dims.unwrap_or_else(|| default_local_dims(&model_name));

        Ok(Self {
            model_name,
            model,
            dims,
            batch_size: config.batch_size,
            loaded: Arc::new(std::sync::Mutex::new(None)),
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let loaded = Arc::clone(&self.loaded);
        let model = self.model.clone();
        let batch_size = self.batch_size;
        let inputs = texts.to_vec();

        let vectors = tokio::task::spawn_blocking(move || {
            let mut guard = loaded.lock().expect("local model lock poisoned");
            if guard.is_none() {
                tracing::info!(model = ?model, "Loading local embedding model");
                let embedding = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(model).with_show_download_progress(true),
                )
                .map_err(|e| {
                    EmbedError::Provider(format!("Failed to initialize local embedding model: {}", e))
                })?;
                *guard = Some(embedding);
            }
            match guard.as_mut() {
                Some(m) => m
                    .embed(inputs, Some(batch_size))
                    .map_err(|e| EmbedError::Provider(format!("Local embedding failed: {}", e))),
                None => Err(EmbedError::Provider("local model not loaded".into())),
            }
        })
        .await
        .map_err(|e| EmbedError::Provider(format!("embedding task failed: {}", e)))??;

        finish(vectors, texts.len(), self.dims)
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1.5, multilingual-e5-small",
            other
        ),
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn default_local_dims(name: &str) -> usize {
    match name {
        "bge-base-en-v1.5" | "nomic-embed-text-v1.5" => 768,
        "bge-large-en-v1.5" => 1024,
        _ => 384,
    }
}

// ============ Shared ============

fn provider_error(e: anyhow::Error) -> EmbedError {
    EmbedError::Provider(format!("{:#}", e))
}

fn to_f32(values: &[serde_json::Value]) -> Vec<f32> {
    values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect()
}

/// Check count and dimensionality, then L2-normalise every vector.
fn finish(
    mut vectors: Vec<Vec<f32>>,
    expected_count: usize,
    dims: usize,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    if vectors.len() != expected_count {
        return Err(EmbedError::Provider(format!(
            "expected {} embeddings, got {}",
            expected_count,
            vectors.len()
        )));
    }
    for v in &mut vectors {
        if v.len() != dims {
            return Err(EmbedError::Dimension {
                expected: dims,
                actual: v.len(),
            });
        }
        l2_normalize(v);
    }
    Ok(vectors)
}

/// Create the embedder named by `[embedding].provider`.
///
/// | Config Value | Embedder |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"hash"` | [`HashEmbedder`] (`dims` defaults to 256) |
/// | `"openai"` | [`OpenAIEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"local"` | `LocalEmbedder` (feature `local-embeddings-fastembed`) |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.provider.as_str() {
        "disabled" => Arc::new(DisabledEmbedder),
        "hash" => Arc::new(HashEmbedder::new(config.dims.unwrap_or(DEFAULT_HASH_DIMS))),
        "openai" => Arc::new(OpenAIEmbedder::new(config)?),
        "ollama" => Arc::new(OllamaEmbedder::new(config)?),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Arc::new(LocalEmbedder::new(config)?),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings-fastembed"),
        other => bail!("Unknown embedding provider: {}", other),
    };
    tracing::debug!(
        provider = %config.provider,
        model = embedder.model_name(),
        dims = embedder.dims(),
        "Embedder created"
    );
    Ok(embedder)
}

/// Embed `texts` in batches of `batch_size`, preserving order.
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        vectors.extend(embedder.embed_batch(batch).await?);
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: provider.to_string(),
            dims: Some(64),
            ..EmbeddingConfig::default()
        }
    }

    #[tokio::test]
    async fn test_disabled_fails() {
        let embedder = create_embedder(&EmbeddingConfig::default()).unwrap();
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, EmbedError::Disabled));
    }

    #[tokio::test]
    async fn test_hash_provider_is_normalised() {
        let embedder = create_embedder(&config("hash")).unwrap();
        assert_eq!(embedder.dims(), 64);
        let v = embedder.embed("quarterly revenue grew").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_batches_preserve_order() {
        let embedder = HashEmbedder::new(32);
        let texts: Vec<String> = (0..5).map(|i| format!("text number {}", i)).collect();
        let batched = embed_in_batches(&embedder, &texts, 2).await.unwrap();
        let whole = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(batched, whole);
    }

    #[test]
    fn test_unknown_provider() {
        assert!(create_embedder(&config("magic")).is_err());
    }

    #[test]
    fn test_parse_openai_response_orders_by_index() {
        let json = serde_json::json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        });
        let vectors = parse_openai_response(&json).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_ollama_response() {
        let json = serde_json::json!({"embeddings": [[3.0, 4.0]]});
        let vectors = finish(parse_ollama_response(&json).unwrap(), 1, 2).unwrap();
        assert!((vectors[0][0] - 0.6).abs() < 1e-6);
        assert!((vectors[0][1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_finish_rejects_wrong_dims() {
        let err = finish(vec![vec![1.0, 0.0, 0.0]], 1, 2).unwrap_err();
        assert!(matches!(err, EmbedError::Dimension { expected: 2, actual: 3 }));
        assert!(parse_openai_response(&serde_json::json!({})).is_err());
    }
}
