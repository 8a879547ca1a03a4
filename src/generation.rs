//! Concrete [`Generator`] implementations.
//!
//! | Provider | Endpoint | Credential |
//! |----------|----------|------------|
//! | `gemini` | `POST /v1beta/models/{model}:generateContent` | `GEMINI_API_KEY` |
//! | `openai` | `POST /v1/chat/completions` | `OPENAI_API_KEY` |
//! | `ollama` | `POST /api/generate` | none |
//! | `disabled` | none | none |
//!
//! A missing credential fails construction. Each prompt is sent once;
//! HTTP errors, timeouts and malformed bodies come back as `Err` and the
//! answer engine turns them into a reported failure.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use repo_qa_core::answer::Generator;

use crate::config::GenerationConfig;

pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-pro-latest";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const OLLAMA_DEFAULT_MODEL: &str = "llama3.2";

const OPENAI_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiGenerator::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

fn env_key(var: &str) -> Result<String> {
    std::env::var(var).map_err(|_| anyhow!("{} environment variable not set", var))
}

/// Send `body` and return the parsed JSON, failing on non-2xx.
async fn post_json(
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
    provider: &str,
) -> Result<serde_json::Value> {
    let response = request
        .json(body)
        .send()
        .await
        .with_context(|| format!("{} request failed", provider))?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("{} API error {}: {}", provider, status, body_text);
    }

    response
        .json()
        .await
        .with_context(|| format!("Invalid {} response body", provider))
}

// ============ Gemini ============

pub struct GeminiGenerator {
    model: String,
    url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Self::with_api_key(config, env_key("GEMINI_API_KEY")?)
    }

    pub fn with_api_key(config: &GenerationConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_string()),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| GEMINI_API_URL.to_string()),
            api_key: api_key.into(),
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });
        let request = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.url, self.model
            ))
            .header("x-goog-api-key", &self.api_key);

        let json = post_json(request, &body, "Gemini").await?;
        parse_gemini_response(&json)
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_gemini_response(json: &serde_json::Value) -> Result<String> {
    let Some(candidate) = json.pointer("/candidates/0") else {
        let reason = json
            .pointer("/promptFeedback/blockReason")
            .and_then(|r| r.as_str())
            .unwrap_or("no candidates returned");
        bail!("Gemini returned no answer: {}", reason);
    };

    let parts = candidate
        .pointer("/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing content parts"))?;

    Ok(parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect())
}

// ============ OpenAI ============

pub struct OpenAIGenerator {
    model: String,
    url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Self::with_api_key(config, env_key("OPENAI_API_KEY")?)
    }

    pub fn with_api_key(config: &GenerationConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string()),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| crate::embedding::OPENAI_API_URL.to_string()),
            api_key: api_key.into(),
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": OPENAI_SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
        });
        let request = self
            .client
            .post(format!("{}/v1/chat/completions", self.url))
            .bearer_auth(&self.api_key);

        let json = post_json(request, &body, "OpenAI").await?;
        json.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
    }
}

// ============ Ollama ============

pub struct OllamaGenerator {
    model: String,
    url: String,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| OLLAMA_DEFAULT_MODEL.to_string()),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| crate::embedding::OLLAMA_API_URL.to_string()),
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        let request = self.client.post(format!("{}/api/generate", self.url));

        let json = post_json(request, &body, "Ollama").await?;
        json.get("response")
            .and_then(|r| r.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Invalid Ollama response: missing response"))
    }
}

// ============ Disabled ============

/// Fails every call; answers surface as reported failures.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        bail!("generation provider is disabled")
    }
}
