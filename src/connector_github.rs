//! GitHub REST file-tree provider.
//!
//! Walks a repository through the contents API:
//!
//! - `GET {api}/repos/{owner}/{name}/contents/{dir}` returns a JSON array of
//!   `{type, name, path, size}` entries.
//! - The same endpoint on a file returns `{content, encoding: "base64"}`;
//!   the content is base64 with embedded line breaks.
//!
//! Every request carries the token as `Bearer`, a `User-Agent`, and
//! `Accept: application/vnd.github+json`.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use std::time::Duration;

use repo_qa_core::ingest::{FileEntry, FileTreeProvider, TreeEntry};

use crate::config::GitHubConfig;

pub struct GitHubTree {
    api_url: String,
    token: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    #[serde(rename = "type")]
    kind: String,
    name: String,
    path: String,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
struct FileContent {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

impl GitHubTree {
    /// Reads the token from the variable named by `github.token_env`.
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let token = std::env::var(&config.token_env).map_err(|_| {
            anyhow!(
                "{} environment variable not set (required for the github source)",
                config.token_env
            )
        })?;
        Self::with_token(config, token)
    }

    pub fn with_token(config: &GitHubConfig, token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("repo-qa/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        })
    }

    /// `{api}/repos/{repo}/contents/{path}` with every path segment
    /// percent-encoded, so names like `C#` or `100%` stay one segment.
    fn contents_url(&self, repo: &str, path: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.api_url)
            .with_context(|| format!("Invalid GitHub API URL: {}", self.api_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("GitHub API URL cannot be a base: {}", self.api_url))?
            .pop_if_empty()
            .push("repos")
            .extend(repo.split('/'))
            .push("contents")
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, repo: &str, path: &str) -> Result<T> {
        let url = self.contents_url(repo, path)?;
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .with_context(|| format!("GitHub request failed: {}", url))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            bail!("GitHub repository or path not found: {}/{}", repo, path);
        }
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("GitHub API error {}: {}", status, body_text);
        }

        response
            .json()
            .await
            .with_context(|| format!("Invalid GitHub response for {}", url))
    }
}

#[async_trait]
impl FileTreeProvider for GitHubTree {
    async fn list(&self, repo: &str, path: &str) -> Result<Vec<TreeEntry>> {
        let entries: Vec<ContentEntry> = self.get(repo, path).await?;

        Ok(entries
            .into_iter()
            .filter_map(|e| match e.kind.as_str() {
                "dir" => Some(TreeEntry::Dir { path: e.path }),
                "file" => Some(TreeEntry::File(FileEntry {
                    path: e.path,
                    name: e.name,
                    size: e.size,
                })),
                // symlinks and submodules are not followed
                _ => None,
            })
            .collect())
    }

    async fn fetch(&self, repo: &str, file: &FileEntry) -> Result<Vec<u8>> {
        let content: FileContent = self.get(repo, &file.path).await?;
        if content.encoding != "base64" {
            bail!(
                "Unsupported content encoding '{}' for {}",
                content.encoding,
                file.path
            );
        }
        decode_content(&content.content)
            .with_context(|| format!("Failed to decode {}", file.path))
    }
}

/// Decode GitHub's line-wrapped base64.
fn decode_content(content: &str) -> Result<Vec<u8>> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(base64::engine::general_purpose::STANDARD.decode(compact)?)
}

/// Normalize `owner/name`, `https://github.com/owner/name` or
/// `git@github.com:owner/name.git` to `owner/name`.
pub fn parse_repo(input: &str) -> Result<String> {
    let trimmed = input.trim().trim_end_matches('/');
    let without_host = trimmed
        .strip_prefix("https://github.com/")
        .or_else(|| trimmed.strip_prefix("http://github.com/"))
        .or_else(|| trimmed.strip_prefix("github.com/"))
        .or_else(|| trimmed.strip_prefix("git@github.com:"))
        .unwrap_or(trimmed);
    let repo = without_host.strip_suffix(".git").unwrap_or(without_host);

    match repo.split_once('/') {
        Some((owner, name))
            if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
        {
            Ok(format!("{}/{}", owner, name))
        }
        _ => bail!(
            "Invalid repository '{}': expected owner/name or a github.com URL",
            input
        ),
    }
}
