//! TOML configuration.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a usable configuration:
//!
//! ```toml
//! [chunking]
//! max_chars = 1000
//! overlap_chars = 200
//!
//! [ingest]
//! max_file_bytes = 500000
//! exclude_globs = ["**/.git/**", "**/target/**", "**/node_modules/**"]
//! # local_root = "/srv/checkouts"
//!
//! [retrieval]
//! top_k = 5
//!
//! [embedding]
//! provider = "local"          # local | openai | ollama | hashing
//!
//! [generation]
//! provider = "gemini"         # gemini | openai | ollama | disabled
//! model = "gemini-pro-latest"
//!
//! [github]
//! token_env = "GITHUB_TOKEN"
//!
//! [server]
//! bind = "127.0.0.1:8002"
//! ```
//!
//! Credentials never live in the file; providers read them from the
//! environment at construction.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use repo_qa_core::chunk::{ChunkerConfig, DEFAULT_MAX_CHARS, DEFAULT_OVERLAP_CHARS};
use repo_qa_core::ingest::{
    FileFilter, IngestOptions, DEFAULT_EXTENSIONS, DEFAULT_FILENAMES, DEFAULT_MAX_FILE_BYTES,
};

/// Used when `--config` is not given. A missing file there is not an error.
pub const DEFAULT_CONFIG_PATH: &str = "./config/rqa.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            overlap_chars: DEFAULT_OVERLAP_CHARS,
        }
    }
}

fn default_max_chars() -> usize {
    DEFAULT_MAX_CHARS
}
fn default_overlap_chars() -> usize {
    DEFAULT_OVERLAP_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Files of this size or larger are skipped.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Extensionless names indexed by exact match.
    #[serde(default = "default_filenames")]
    pub filenames: Vec<String>,
    /// Only applied by the local source.
    #[serde(default = "default_exclude_globs")]
    pub exclude_globs: Vec<String>,
    /// Directory that local repositories must live under. Required by
    /// `rqa serve --source local`; relative repositories resolve against it.
    #[serde(default)]
    pub local_root: Option<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            extensions: default_extensions(),
            filenames: default_filenames(),
            exclude_globs: default_exclude_globs(),
            local_root: None,
        }
    }
}

fn default_max_file_bytes() -> u64 {
    DEFAULT_MAX_FILE_BYTES
}
fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}
fn default_filenames() -> Vec<String> {
    DEFAULT_FILENAMES.iter().map(|s| s.to_string()).collect()
}
fn default_exclude_globs() -> Vec<String> {
    vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    repo_qa_core::answer::DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override for `openai` and `ollama`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    /// Defaults per provider: `gemini-pro-latest`, `gpt-4o-mini`, `llama3.2`.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: None,
            url: None,
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_provider() -> String {
    "gemini".to_string()
}
fn default_generation_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitHubConfig {
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
    /// Name of the environment variable holding the access token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_github_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            token_env: default_token_env(),
            timeout_secs: default_github_timeout_secs(),
        }
    }
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}
fn default_github_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8002".to_string()
}

impl Config {
    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.chunker_config()?;

        if self.ingest.max_file_bytes == 0 {
            bail!("ingest.max_file_bytes must be > 0");
        }

        if self.retrieval.top_k < 1 {
            bail!("retrieval.top_k must be >= 1");
        }

        let embedding = &self.embedding;
        match embedding.provider.as_str() {
            "local" | "hashing" => {}
            "openai" | "ollama" => {
                if embedding.model.is_none() {
                    bail!(
                        "embedding.model must be specified when provider is '{}'",
                        embedding.provider
                    );
                }
                if embedding.dims.is_none() || embedding.dims == Some(0) {
                    bail!(
                        "embedding.dims must be > 0 when provider is '{}'",
                        embedding.provider
                    );
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be local, openai, ollama, or hashing.",
                other
            ),
        }
        if embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }

        match self.generation.provider.as_str() {
            "gemini" | "openai" | "ollama" | "disabled" => {}
            other => bail!(
                "Unknown generation provider: '{}'. Must be gemini, openai, ollama, or disabled.",
                other
            ),
        }

        Ok(())
    }

    pub fn chunker_config(&self) -> Result<ChunkerConfig> {
        ChunkerConfig::new(self.chunking.max_chars, self.chunking.overlap_chars)
            .context("Invalid [chunking] settings")
    }

    /// Chunking and file-selection settings for the ingestor.
    pub fn ingest_options(&self) -> Result<IngestOptions> {
        Ok(IngestOptions {
            chunker: self.chunker_config()?,
            filter: FileFilter::new(
                self.ingest.max_file_bytes,
                &self.ingest.extensions,
                &self.ingest.filenames,
            ),
        })
    }
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Load `explicit` if given, else the default path if it exists, else
/// built-in defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        load_config(default_path)
    } else {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.chunking.max_chars, 1000);
        assert_eq!(config.chunking.overlap_chars, 200);
        assert_eq!(config.ingest.max_file_bytes, 500_000);
        assert!(config.ingest.extensions.iter().any(|e| e == "rs"));
        assert_eq!(config.ingest.filenames, vec!["Dockerfile", "Makefile", "README"]);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.embedding.provider, "local");
        assert_eq!(config.generation.provider, "gemini");
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.server.bind, "127.0.0.1:8002");
    }

    #[test]
    fn test_partial_sections() {
        let config = parse_config(
            r#"
[chunking]
max_chars = 400

[embedding]
provider = "ollama"
model = "nomic-embed-text"
dims = 768
url = "http://gpu-box:11434"

[generation]
provider = "disabled"
"#,
        )
        .unwrap();
        assert_eq!(config.chunking.max_chars, 400);
        assert_eq!(config.chunking.overlap_chars, 200);
        assert_eq!(config.embedding.url.as_deref(), Some("http://gpu-box:11434"));
        assert_eq!(config.embedding.batch_size, 64);
        assert_eq!(config.generation.timeout_secs, 60);
    }

    #[test]
    fn test_rejects_overlap_not_below_size() {
        let err = parse_config("[chunking]\nmax_chars = 100\noverlap_chars = 100\n").unwrap_err();
        assert!(format!("{err:#}").contains("must be smaller than chunk size"));
    }

    #[test]
    fn test_rejects_unknown_providers() {
        assert!(parse_config("[embedding]\nprovider = \"magic\"\n").is_err());
        assert!(parse_config("[generation]\nprovider = \"magic\"\n").is_err());
    }

    #[test]
    fn test_remote_embedding_requires_model_and_dims() {
        let err = parse_config("[embedding]\nprovider = \"openai\"\n").unwrap_err();
        assert!(err.to_string().contains("embedding.model"));
        let err = parse_config(
            "[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn test_rejects_zero_top_k() {
        assert!(parse_config("[retrieval]\ntop_k = 0\n").is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(resolve_config(Some(&missing)).is_err());
    }

    #[test]
    fn test_ingest_options_follow_config() {
        let config = parse_config(
            "[chunking]\nmax_chars = 300\noverlap_chars = 30\n[ingest]\nmax_file_bytes = 10\n",
        )
        .unwrap();
        let options = config.ingest_options().unwrap();
        assert_eq!(options.chunker.max_chars(), 300);
        assert_eq!(options.chunker.overlap_chars(), 30);
    }
}
