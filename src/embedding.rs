//! Concrete [`Embedder`] implementations.
//!
//! - **[`OpenAIEmbedder`]** calls `POST /v1/embeddings`, sub-batched by
//!   `embedding.batch_size`.
//! - **[`OllamaEmbedder`]** calls a local Ollama instance's `/api/embed`.
//! - **[`LocalEmbedder`]** runs a model in-process via fastembed (feature
//!   `local-embeddings`); no network calls after the model download.
//! - `hashing` maps to the core [`HashingEmbedder`], which needs nothing.
//!
//! Requests are made once. Timeouts come from `embedding.timeout_secs`
//! and surface as errors like any other HTTP failure.
//!
//! ```rust
//! # use repo_qa::config::EmbeddingConfig;
//! # use repo_qa::embedding::create_embedder;
//! let config = EmbeddingConfig {
//!     provider: "hashing".to_string(),
//!     ..EmbeddingConfig::default()
//! };
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.model_name(), "hashing");
//! ```

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use repo_qa_core::embedding::{Embedder, HashingEmbedder};

use crate::config::EmbeddingConfig;

pub const OPENAI_API_URL: &str = "https://api.openai.com";
pub const OLLAMA_API_URL: &str = "http://localhost:11434";

/// Build the embedder named by `embedding.provider`.
///
/// # Errors
///
/// Unknown providers, missing `model`/`dims` for remote providers, and a
/// missing `OPENAI_API_KEY` are configuration errors.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "hashing" => Ok(Arc::new(HashingEmbedder::new(
            config.dims.unwrap_or(HashingEmbedder::DEFAULT_DIMS),
        ))),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

fn required_model_and_dims(config: &EmbeddingConfig, provider: &str) -> Result<(String, usize)> {
    let model = config
        .model
        .clone()
        .ok_or_else(|| anyhow!("embedding.model required for {} provider", provider))?;
    let dims = config
        .dims
        .ok_or_else(|| anyhow!("embedding.dims required for {} provider", provider))?;
    Ok((model, dims))
}

fn parse_vector(value: &serde_json::Value, what: &str) -> Result<Vec<f32>> {
    value
        .as_array()
        .ok_or_else(|| anyhow!("Invalid {} response: embedding is not an array", what))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|x| x as f32)
                .ok_or_else(|| anyhow!("Invalid {} response: non-numeric embedding value", what))
        })
        .collect()
}

// ============ OpenAI ============

pub struct OpenAIEmbedder {
    model: String,
    dims: usize,
    url: String,
    batch_size: usize,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIEmbedder {
    /// Reads the key from `OPENAI_API_KEY`.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &EmbeddingConfig, api_key: impl Into<String>) -> Result<Self> {
        let (model, dims) = required_model_and_dims(config, "OpenAI")?;
        Ok(Self {
            model,
            dims,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_API_URL.to_string()),
            batch_size: config.batch_size.max(1),
            api_key: api_key.into(),
            client: http_client(config.timeout_secs)?,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("OpenAI embeddings request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_openai_response(&json)
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

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let vectors = self.embed_batch(batch).await?;
            if vectors.len() != batch.len() {
                bail!(
                    "OpenAI returned {} embeddings for {} inputs",
                    vectors.len(),
                    batch.len()
                );
            }
            out.extend(vectors);
        }
        Ok(out)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, parse_vector(embedding, "OpenAI")?));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama ============

pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    url: String,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model, dims) = required_model_and_dims(config, "Ollama")?;
        Ok(Self {
            model,
            dims,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OLLAMA_API_URL.to_string()),
            client: http_client(config.timeout_secs)?,
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

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/api/embed", self.url))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Ollama connection error (is Ollama running at {}?)", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Ollama API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?
        .iter()
        .map(|v| parse_vector(v, "Ollama"))
        .collect()
}

// ============ Local (fastembed) ============

/// In-process sentence embeddings.
///
/// The model is downloaded and loaded on first use, then reused for the
/// lifetime of the embedder. Inference runs on the blocking thread pool.
#[cfg(feature = "local-embeddings")]
pub struct LocalEmbedder {
    model_name: String,
    model: fastembed::EmbeddingModel,
    dims: usize,
    batch_size: usize,
    loaded: Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings")]
impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| "all-minilm-l6-v2".to_string());
        let (model, default_dims) = fastembed_model(&model_name)?;
        Ok(Self {
            model_name,
            model,
            dims: config.dims.unwrap_or(default_dims),
            batch_size: config.batch_size.max(1),
            loaded: Arc::new(std::sync::Mutex::new(None)),
        })
    }
}

#[cfg(feature = "local-embeddings")]
fn fastembed_model(name: &str) -> Result<(fastembed::EmbeddingModel, usize)> {
    use fastembed::EmbeddingModel;
    match name {
        "all-minilm-l6-v2" => Ok((EmbeddingModel::AllMiniLML6V2, 384)),
        "bge-small-en-v1.5" => Ok((EmbeddingModel::BGESmallENV15, 384)),
        "bge-base-en-v1.5" => Ok((EmbeddingModel::BGEBaseENV15, 768)),
        "nomic-embed-text-v1.5" => Ok((EmbeddingModel::NomicEmbedTextV15, 768)),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, nomic-embed-text-v1.5",
            other
        ),
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let loaded = Arc::clone(&self.loaded);
        let model = self.model.clone();
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut guard = loaded
                .lock()
                .map_err(|_| anyhow!("Local embedding model lock poisoned"))?;
            if guard.is_none() {
                tracing::info!(model = ?model, "loading local embedding model");
                let init = fastembed::InitOptions::new(model).with_show_download_progress(false);
                let m = fastembed::TextEmbedding::try_new(init)
                    .map_err(|e| anyhow!("Failed to initialize local embedding model: {}", e))?;
                *guard = Some(m);
            }
            let m = guard
                .as_mut()
                .ok_or_else(|| anyhow!("Local embedding model not loaded"))?;
            m.embed(texts, Some(batch_size))
                .map_err(|e| anyhow!("Local embedding failed: {}", e))
        })
        .await
        .context("Local embedding task panicked")?
    }
}
