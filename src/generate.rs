//! Answer generation through an LLM.
//!
//! | Config Value | Generator |
//! |-------------|-----------|
//! | `"disabled"` | [`DisabledGenerator`] |
//! | `"openai"` | [`OpenAIGenerator`] (`POST /v1/chat/completions`) |
//! | `"ollama"` | [`OllamaGenerator`] (`POST /api/generate`) |

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::retry;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const GENERATION_RETRIES: u32 = 2;

const SYSTEM_INSTRUCTION: &str = "You answer questions about the user's uploaded PDF documents. \
Use only the provided context. If the context does not contain the answer, say so plainly. \
When the context comes from more than one document, say which document each fact comes from.";

/// A rendered prompt, split so chat-style APIs can keep roles apart.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Build the prompt for `question` over an already-budgeted context string.
pub fn render_prompt(context: &str, question: &str) -> Prompt {
    Prompt {
        system: SYSTEM_INSTRUCTION.to_string(),
        user: format!(
            "Context:\n{}\n\nQuestion: {}\n\nAnswer:",
            context.trim_end(),
            question.trim()
        ),
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;
    async fn generate(&self, prompt: &Prompt) -> Result<String>;
}

// ============ Disabled ============

pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _prompt: &Prompt) -> Result<String> {
        bail!("Generation provider is disabled. Set [generation] provider in config.")
    }
}

// ============ OpenAI ============

pub struct OpenAIGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key,
            model,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user},
            ],
        });
        let json = retry::send_json(
            || {
                self.client
                    .post("https://api.openai.com/v1/chat/completions")
                    .bearer_auth(&self.api_key)
                    .json(&body)
            },
            GENERATION_RETRIES,
            "OpenAI",
        )
        .await?;
        parse_openai_answer(&json)
    }
}

fn parse_openai_answer(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

// ============ Ollama ============

pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for Ollama provider"))?;
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
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "system": prompt.system,
            "prompt": prompt.user,
            "stream": false,
            "options": {"temperature": self.temperature},
        });
        let endpoint = format!("{}/api/generate", self.url);
        let json = retry::send_json(
            || self.client.post(&endpoint).json(&body),
            GENERATION_RETRIES,
            "Ollama",
        )
        .await?;
        json.get("response")
            .and_then(|r| r.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response"))
    }
}

pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    let generator: Arc<dyn Generator> = match config.provider.as_str() {
        "disabled" => Arc::new(DisabledGenerator),
        "openai" => Arc::new(OpenAIGenerator::new(config)?),
        "ollama" => Arc::new(OllamaGenerator::new(config)?),
        other => bail!("Unknown generation provider: {}", other),
    };
    Ok(generator)
}
