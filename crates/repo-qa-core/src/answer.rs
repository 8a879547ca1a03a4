//! Retrieval-augmented answer engine.
//!
//! Embeds the question with the ingestion embedder, retrieves the nearest
//! chunks, assembles a labeled context block, and hands a single prompt to
//! a [`Generator`]. Generation failures are absorbed into
//! [`Answer::Failed`]; nothing here returns an error.

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::embedding::Embedder;
use crate::models::SearchHit;
use crate::store::VectorIndex;

/// Default number of chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 5;

/// Returned instead of an answer when no repository has been ingested.
pub const NOT_READY_MESSAGE: &str = "System not ready. Repository needs to be ingested first.";

/// A text-completion model.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Provider name used in logs (e.g. `"gemini"`).
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Outcome of answering one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Answered(String),
    NotReady,
    /// The embedding or generation call failed; carries the reason.
    Failed(String),
}

impl Answer {
    pub fn is_answered(&self) -> bool {
        matches!(self, Answer::Answered(_))
    }

    /// Machine-readable status: `answered`, `not_ready` or `failed`.
    pub fn status(&self) -> &'static str {
        match self {
            Answer::Answered(_) => "answered",
            Answer::NotReady => "not_ready",
            Answer::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Answered(text) => f.write_str(text),
            Answer::NotReady => f.write_str(NOT_READY_MESSAGE),
            Answer::Failed(reason) => write!(f, "Error: {reason}"),
        }
    }
}

/// Concatenate retrieved documents in rank order, each under a
/// `--- <file_path> ---` label.
pub fn build_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| format!("--- {} ---\n{}\n", hit.metadata.file_path, hit.document))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_prompt(repo: &str, context: &str, question: &str) -> String {
    format!(
        "Analyze repository: {repo}\n\n\
         Context:\n{context}\n\n\
         Question: {question}\n\n\
         Provide concise answer with file references and code snippets. \
         Don't over explain and no emojis. Just answer the user's query in enough words"
    )
}

/// Answer `question` against whatever `index` currently holds.
///
/// Readiness is the caller's concern; see
/// [`RepoSession::answer`](crate::session::RepoSession::answer).
pub async fn answer<I: VectorIndex>(
    index: &I,
    embedder: &dyn Embedder,
    generator: &dyn Generator,
    repo: &str,
    question: &str,
    k: usize,
) -> Answer {
    let query = match embedder.embed_one(question).await {
        Ok(v) => v,
        Err(e) => {
            warn!(model = embedder.model_name(), error = %e, "question embedding failed");
            return Answer::Failed(format!("{e:#}"));
        }
    };

    let hits = index.query(&query, k.min(index.count()));
    debug!(
        retrieved = hits.len(),
        top = hits.first().map(|h| h.id.as_str()).unwrap_or(""),
        "retrieved context"
    );

    let prompt = build_prompt(repo, &build_context(&hits), question);
    match generator.generate(&prompt).await {
        Ok(text) => Answer::Answered(text),
        Err(e) => {
            warn!(provider = generator.name(), error = %e, "generation failed");
            Answer::Failed(format!("{e:#}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn hit(path: &str, doc: &str) -> SearchHit {
        SearchHit {
            id: format!("{path}-0"),
            score: 0.5,
            document: doc.to_string(),
            metadata: ChunkMetadata {
                file_path: path.to_string(),
                chunk: 0,
            },
        }
    }

    #[test]
    fn test_context_labels_each_hit_in_order() {
        let ctx = build_context(&[hit("src/a.rs", "alpha"), hit("b.md", "beta")]);
        assert_eq!(ctx, "--- src/a.rs ---\nalpha\n\n--- b.md ---\nbeta\n");
    }

    #[test]
    fn test_context_empty() {
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn test_prompt_carries_repo_context_and_question() {
        let prompt = build_prompt("octo/hello", "--- a.rs ---\nfn a() {}\n", "what does a do?");
        assert!(prompt.starts_with("Analyze repository: octo/hello\n\nContext:\n--- a.rs ---"));
        assert!(prompt.contains("\n\nQuestion: what does a do?\n\n"));
        assert!(prompt.contains("file references and code snippets"));
    }

    #[test]
    fn test_prompt_for_local_checkout_does_not_claim_github() {
        let prompt = build_prompt("/srv/checkouts/alpha", "", "where is main?");
        assert!(prompt.starts_with("Analyze repository: /srv/checkouts/alpha\n"));
        assert!(!prompt.contains("GitHub"));
    }

    #[test]
    fn test_answer_display() {
        assert_eq!(Answer::Answered("42".into()).to_string(), "42");
        assert_eq!(Answer::NotReady.to_string(), NOT_READY_MESSAGE);
        assert_eq!(
            Answer::Failed("quota exceeded".into()).to_string(),
            "Error: quota exceeded"
        );
        assert_eq!(Answer::Failed(String::new()).status(), "failed");
        assert!(!Answer::NotReady.is_answered());
    }
}
