//! Core data models shared by the ingestion and answering pipeline.

use serde::Serialize;

use crate::chunk::chunk_header;

/// A bounded slice of one file's text, rendered with a source header.
///
/// `start..end` is the slice's range in the source text, measured in
/// chars. `text` is `File: <path>\n\n` followed by that slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub file_path: String,
    /// 0-based position within the file, in document order.
    pub chunk_index: usize,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Chunk {
    /// The chunk text without its `File:` header.
    pub fn body(&self) -> &str {
        let header = chunk_header(&self.file_path);
        self.text.strip_prefix(header.as_str()).unwrap_or(&self.text)
    }

    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            file_path: self.file_path.clone(),
            chunk: self.chunk_index,
        }
    }
}

/// Provenance stored next to every vector in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkMetadata {
    pub file_path: String,
    pub chunk: usize,
}

/// One row of the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// Unique within the index, e.g. `f3_c0`.
    pub id: String,
    pub vector: Vec<f32>,
    /// The rendered chunk text.
    pub document: String,
    pub metadata: ChunkMetadata,
}

/// A retrieved entry with its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub document: String,
    pub metadata: ChunkMetadata,
}

/// Counters returned by a completed ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub files_indexed: usize,
    pub chunks_indexed: usize,
    /// Files seen in the tree but not indexed (filtered or unreadable).
    pub files_skipped: usize,
}
