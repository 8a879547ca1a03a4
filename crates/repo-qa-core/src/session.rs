//! One ingest-then-answer cycle over an exclusively owned index.
//!
//! A [`RepoSession`] holds the vector index, the shared embedder and
//! generator, and a readiness flag. Ingestion takes `&mut self`, so the
//! destructive reset can never race an answer on the same session;
//! concurrent users each construct their own session.

use std::sync::Arc;

use anyhow::Result;

use crate::answer::{self, Answer, Generator};
use crate::embedding::Embedder;
use crate::ingest::{self, FileTreeProvider, IngestOptions};
use crate::models::IngestReport;
use crate::store::memory::InMemoryIndex;
use crate::store::VectorIndex;

pub struct RepoSession<I: VectorIndex = InMemoryIndex> {
    index: I,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    options: IngestOptions,
    repo: Option<String>,
    ready: bool,
}

impl RepoSession<InMemoryIndex> {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        options: IngestOptions,
    ) -> Self {
        Self::with_index(InMemoryIndex::new(), embedder, generator, options)
    }
}

impl<I: VectorIndex> RepoSession<I> {
    pub fn with_index(
        index: I,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        options: IngestOptions,
    ) -> Self {
        Self {
            index,
            embedder,
            generator,
            options,
            repo: None,
            ready: false,
        }
    }

    /// Replace the session's contents with `repo`.
    ///
    /// Readiness is cleared before any work starts and set again only if
    /// at least one chunk was indexed, so a failed or empty ingestion
    /// leaves the session not ready.
    pub async fn ingest(
        &mut self,
        provider: &dyn FileTreeProvider,
        repo: &str,
    ) -> Result<IngestReport> {
        self.ready = false;
        self.repo = None;

        let report = ingest::ingest(
            &mut self.index,
            self.embedder.as_ref(),
            provider,
            repo,
            &self.options,
        )
        .await?;

        self.repo = Some(repo.to_string());
        self.ready = report.chunks_indexed > 0;
        Ok(report)
    }

    /// Answer `question` from the ingested repository.
    ///
    /// Returns [`Answer::NotReady`] without touching the index or any
    /// model when nothing has been ingested.
    pub async fn answer(&self, question: &str, k: usize) -> Answer {
        let repo = match (&self.repo, self.ready) {
            (Some(repo), true) => repo,
            _ => return Answer::NotReady,
        };
        answer::answer(
            &self.index,
            self.embedder.as_ref(),
            self.generator.as_ref(),
            repo,
            question,
            k,
        )
        .await
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// The last successfully ingested repository.
    pub fn repo(&self) -> Option<&str> {
        self.repo.as_deref()
    }

    pub fn index(&self) -> &I {
        &self.index
    }
}
