//! Request-scoped orchestration of one ingest-then-answer cycle.
//!
//! [`QaService`] holds the process-wide collaborators (embedder,
//! generator, file-tree provider) and builds a fresh
//! [`RepoSession`] for every call, so concurrent requests never share an
//! index.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use repo_qa_core::answer::{Answer, Generator};
use repo_qa_core::embedding::Embedder;
use repo_qa_core::ingest::{FileTreeProvider, IngestOptions};
use repo_qa_core::models::IngestReport;
use repo_qa_core::session::RepoSession;

use crate::config::Config;
use crate::connector_fs::LocalTree;
use crate::connector_github::{parse_repo, GitHubTree};
use crate::embedding::create_embedder;
use crate::generation::create_generator;

/// Where repositories are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Source {
    /// GitHub REST API; the repository is `owner/name` or a github.com URL.
    Github,
    /// A directory on this machine.
    Local,
}

/// Result of [`QaService::ask`].
#[derive(Debug, Clone)]
pub struct QaOutcome {
    pub repo: String,
    pub report: IngestReport,
    pub answer: Answer,
}

impl QaOutcome {
    /// The text shown to users: `Answer for repo '<repo>':` and the answer.
    pub fn render(&self) -> String {
        format!("Answer for repo '{}':\n{}", self.repo, self.answer)
    }
}

#[derive(Clone)]
pub struct QaService {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    provider: Arc<dyn FileTreeProvider>,
    source: Source,
    options: IngestOptions,
    local_root: Option<PathBuf>,
}

impl QaService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        provider: Arc<dyn FileTreeProvider>,
        source: Source,
        options: IngestOptions,
    ) -> Self {
        Self {
            embedder,
            generator,
            provider,
            source,
            options,
            local_root: None,
        }
    }

    /// Confine local repositories to directories under `root`.
    pub fn with_local_root(mut self, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let canonical = std::fs::canonicalize(root)
            .with_context(|| format!("Invalid local_root: {}", root.display()))?;
        if !canonical.is_dir() {
            bail!("local_root is not a directory: {}", root.display());
        }
        self.local_root = Some(canonical);
        Ok(self)
    }

    /// Build every collaborator from configuration.
    ///
    /// Missing credentials for the chosen providers fail here.
    pub fn from_config(config: &Config, source: Source) -> Result<Self> {
        let provider: Arc<dyn FileTreeProvider> = match source {
            Source::Github => Arc::new(GitHubTree::new(&config.github)?),
            Source::Local => Arc::new(LocalTree::new(&config.ingest)?),
        };
        let service = Self::new(
            create_embedder(&config.embedding)?,
            create_generator(&config.generation)?,
            provider,
            source,
            config.ingest_options()?,
        );
        match (&config.ingest.local_root, source) {
            (Some(root), Source::Local) => service.with_local_root(root),
            _ => Ok(service),
        }
    }

    /// Canonical repository identifier for the configured source.
    ///
    /// With a local root set, a local repository must resolve to a
    /// directory inside it; relative paths are taken from the root.
    pub fn normalize_repo(&self, repo: &str) -> Result<String> {
        match (self.source, &self.local_root) {
            (Source::Github, _) => parse_repo(repo),
            (Source::Local, None) => Ok(repo.trim().to_string()),
            (Source::Local, Some(root)) => {
                let requested = root.join(repo.trim());
                let resolved = std::fs::canonicalize(&requested).with_context(|| {
                    format!("Repository directory does not exist: {}", repo.trim())
                })?;
                if !resolved.starts_with(root) {
                    bail!("Repository must be inside {}", root.display());
                }
                Ok(resolved.to_string_lossy().to_string())
            }
        }
    }

    fn session(&self) -> RepoSession {
        RepoSession::new(
            self.embedder.clone(),
            self.generator.clone(),
            self.options.clone(),
        )
    }

    /// Index `repo` into a throwaway session and report what was indexed.
    pub async fn ingest_only(&self, repo: &str) -> Result<IngestReport> {
        let repo = self.normalize_repo(repo)?;
        self.session().ingest(self.provider.as_ref(), &repo).await
    }

    /// Ingest `repo` and answer `question` from it.
    ///
    /// Ingestion failures (unknown repository, listing errors, embedding
    /// errors) are returned as `Err`; answer-time failures are carried in
    /// [`QaOutcome::answer`].
    pub async fn ask(&self, repo: &str, question: &str, k: usize) -> Result<QaOutcome> {
        let repo = self.normalize_repo(repo)?;
        let mut session = self.session();
        let report = session.ingest(self.provider.as_ref(), &repo).await?;
        let answer = session.answer(question, k).await;
        info!(repo = %repo, status = answer.status(), "answered question");
        Ok(QaOutcome {
            repo,
            report,
            answer,
        })
    }
}
