//! Repository ingestion: walk a file tree, chunk, embed, index.
//!
//! The walk is breadth-first over a [`FileTreeProvider`], starting at the
//! repository root (`""`). Each file either becomes chunks or is skipped
//! with an inspectable [`SkipReason`]; a single unreadable or binary file
//! never aborts ingestion. Listing failures and embedding failures do.
//!
//! All chunks from all files are embedded in one [`Embedder::embed`] call
//! and written with one [`VectorIndex::add`] call, after the index has
//! been reset. The index therefore only ever holds one repository.

use std::collections::{HashSet, VecDeque};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::chunk::{chunk_file, ChunkerConfig};
use crate::embedding::Embedder;
use crate::models::{Chunk, IndexEntry, IngestReport};
use crate::store::VectorIndex;

/// Files at or above this size are not indexed.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 500_000;

/// Extensions (lower-cased, without the dot) indexed by default.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "py", "js", "jsx", "ts", "tsx", "java", "cpp", "c", "h", "cs", "rb", "go", "rs", "php", "html",
    "css", "json", "xml", "yaml", "yml", "md", "txt", "sh", "sql",
];

/// Extensionless conventional files indexed by default (exact match).
pub const DEFAULT_FILENAMES: &[&str] = &["Dockerfile", "Makefile", "README"];

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEntry {
    Dir { path: String },
    File(FileEntry),
}

/// A file as reported by the tree provider, before its content is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path from the repository root, `/`-separated.
    pub path: String,
    /// Bare file name.
    pub name: String,
    pub size: u64,
}

/// Source of a repository's directory structure and file contents.
///
/// `path` is relative to the repository root; the root itself is `""`.
#[async_trait]
pub trait FileTreeProvider: Send + Sync {
    /// List the immediate children of `path`.
    async fn list(&self, repo: &str, path: &str) -> Result<Vec<TreeEntry>>;

    /// Fetch the raw bytes of `file`, already transport-decoded.
    async fn fetch(&self, repo: &str, file: &FileEntry) -> Result<Vec<u8>>;
}

/// Why a file was not indexed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("file is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },
    #[error("file type is not indexed")]
    UnsupportedType,
    #[error("fetch failed: {0}")]
    FetchFailed(String),
    #[error("content is not valid UTF-8")]
    NotUtf8,
}

/// Result of processing a single file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Indexed { path: String, chunks: Vec<Chunk> },
    Skipped { path: String, reason: SkipReason },
}

/// Decides which files are worth fetching.
#[derive(Debug, Clone)]
pub struct FileFilter {
    max_file_bytes: u64,
    extensions: HashSet<String>,
    filenames: HashSet<String>,
}

impl FileFilter {
    pub fn new<E, N>(max_file_bytes: u64, extensions: E, filenames: N) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        N: IntoIterator,
        N::Item: AsRef<str>,
    {
        Self {
            max_file_bytes,
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
            filenames: filenames
                .into_iter()
                .map(|n| n.as_ref().to_string())
                .collect(),
        }
    }

    /// A file is eligible iff it is under the size cap and either its
    /// extension is allow-listed or its whole name is.
    pub fn check(&self, file: &FileEntry) -> Result<(), SkipReason> {
        if file.size >= self.max_file_bytes {
            return Err(SkipReason::TooLarge {
                size: file.size,
                limit: self.max_file_bytes,
            });
        }
        let by_ext = extension(&file.name).is_some_and(|ext| self.extensions.contains(&ext));
        if by_ext || self.filenames.contains(&file.name) {
            Ok(())
        } else {
            Err(SkipReason::UnsupportedType)
        }
    }
}

impl Default for FileFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_BYTES, DEFAULT_EXTENSIONS, DEFAULT_FILENAMES)
    }
}

/// Lower-cased suffix after the last `.`, or `None` when the name has no dot.
pub fn extension(name: &str) -> Option<String> {
    name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())
}

/// Chunking and filtering settings for one ingestion.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub chunker: ChunkerConfig,
    pub filter: FileFilter,
}

/// Walk `repo` breadth-first and chunk every eligible, decodable file.
///
/// Outcomes are returned in visiting order. Only directory listing
/// failures are returned as errors.
pub async fn collect_files(
    provider: &dyn FileTreeProvider,
    repo: &str,
    options: &IngestOptions,
) -> Result<Vec<FileOutcome>> {
    let mut pending: VecDeque<TreeEntry> = provider
        .list(repo, "")
        .await
        .with_context(|| format!("Failed to list repository root of {repo}"))?
        .into();
    let mut outcomes = Vec::new();

    while let Some(entry) = pending.pop_front() {
        match entry {
            TreeEntry::Dir { path } => {
                let children = provider
                    .list(repo, &path)
                    .await
                    .with_context(|| format!("Failed to list directory {path} in {repo}"))?;
                pending.extend(children);
            }
            TreeEntry::File(file) => {
                let outcome = process_file(provider, repo, &file, options).await;
                match &outcome {
                    FileOutcome::Indexed { path, chunks } => {
                        debug!(path = %path, chunks = chunks.len(), "indexed file");
                    }
                    FileOutcome::Skipped { path, reason } => {
                        debug!(path = %path, reason = %reason, "skipped file");
                    }
                }
                outcomes.push(outcome);
            }
        }
    }

    Ok(outcomes)
}

async fn process_file(
    provider: &dyn FileTreeProvider,
    repo: &str,
    file: &FileEntry,
    options: &IngestOptions,
) -> FileOutcome {
    let skipped = |reason| FileOutcome::Skipped {
        path: file.path.clone(),
        reason,
    };

    if let Err(reason) = options.filter.check(file) {
        return skipped(reason);
    }

    let bytes = match provider.fetch(repo, file).await {
        Ok(bytes) => bytes,
        Err(e) => return skipped(SkipReason::FetchFailed(format!("{e:#}"))),
    };

    match String::from_utf8(bytes) {
        Ok(text) => FileOutcome::Indexed {
            path: file.path.clone(),
            chunks: chunk_file(&text, &file.path, &options.chunker),
        },
        Err(_) => skipped(SkipReason::NotUtf8),
    }
}

/// Replace the contents of `index` with the chunks of `repo`.
///
/// The index is reset first, so on error it is left empty rather than
/// holding a previous repository. Entry ids are `f<file>_c<chunk>`, where
/// the file counter only advances for indexed files.
pub async fn ingest<I: VectorIndex>(
    index: &mut I,
    embedder: &dyn Embedder,
    provider: &dyn FileTreeProvider,
    repo: &str,
    options: &IngestOptions,
) -> Result<IngestReport> {
    index.reset();

    let outcomes = collect_files(provider, repo, options).await?;

    let mut report = IngestReport::default();
    let mut ids = Vec::new();
    let mut documents = Vec::new();
    let mut metadata = Vec::new();

    for outcome in outcomes {
        match outcome {
            FileOutcome::Indexed { chunks, .. } => {
                for chunk in chunks {
                    ids.push(format!("f{}_c{}", report.files_indexed, chunk.chunk_index));
                    metadata.push(chunk.metadata());
                    documents.push(chunk.text);
                }
                report.files_indexed += 1;
            }
            FileOutcome::Skipped { .. } => report.files_skipped += 1,
        }
    }

    if !documents.is_empty() {
        let vectors = embedder
            .embed(&documents)
            .await
            .with_context(|| format!("Failed to embed {} chunks", documents.len()))?;
        if vectors.len() != documents.len() {
            bail!(
                "Embedder returned {} vectors for {} chunks",
                vectors.len(),
                documents.len()
            );
        }

        let entries: Vec<IndexEntry> = ids
            .into_iter()
            .zip(vectors)
            .zip(documents.into_iter().zip(metadata))
            .map(|((id, vector), (document, metadata))| IndexEntry {
                id,
                vector,
                document,
                metadata,
            })
            .collect();
        report.chunks_indexed = entries.len();
        index.add(entries)?;
    }

    info!(
        repo,
        files = report.files_indexed,
        chunks = report.chunks_indexed,
        skipped = report.files_skipped,
        "ingestion complete"
    );

    Ok(report)
}
