//! Overlapping, line-aware text chunker.
//!
//! Splits a file's text into [`Chunk`]s of at most `max_chars` characters
//! (excluding the header), where consecutive chunks share `overlap_chars`
//! characters. Every chunk is prefixed with `File: <path>\n\n` so the
//! embedded text and the prompt context both carry their origin.
//!
//! # Algorithm
//!
//! 1. If the text fits in `max_chars`, return it as a single chunk.
//! 2. Otherwise take a window `[start, start + max_chars)`.
//! 3. If the window does not reach the end of the text, back off to the
//!    last newline inside the window, provided that newline lies after
//!    `start + max(max_chars / 2, overlap_chars)`. This avoids cutting
//!    lines while bounding shrinkage to half a window.
//! 4. The next window starts at `end - overlap_chars`; iteration stops
//!    once a window reaches the end of the text.
//!
//! All lengths and offsets are in chars, so slicing never splits a UTF-8
//! sequence.
//!
//! # Example
//!
//! ```rust
//! use repo_qa_core::chunk::{chunk_file, ChunkerConfig};
//!
//! let chunks = chunk_file("fn main() {}\n", "src/main.rs", &ChunkerConfig::default());
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].text, "File: src/main.rs\n\nfn main() {}\n");
//! ```

use thiserror::Error;

use crate::models::Chunk;

pub const DEFAULT_MAX_CHARS: usize = 1000;
pub const DEFAULT_OVERLAP_CHARS: usize = 200;

/// Rejected chunker settings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChunkConfigError {
    #[error("chunk size must be greater than zero")]
    ZeroSize,
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({max})")]
    OverlapTooLarge { overlap: usize, max: usize },
}

/// Validated window size and overlap.
///
/// Construction enforces `0 <= overlap_chars < max_chars`, which is what
/// guarantees the chunker always makes forward progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    max_chars: usize,
    overlap_chars: usize,
}

impl ChunkerConfig {
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self, ChunkConfigError> {
        if max_chars == 0 {
            return Err(ChunkConfigError::ZeroSize);
        }
        if overlap_chars >= max_chars {
            return Err(ChunkConfigError::OverlapTooLarge {
                overlap: overlap_chars,
                max: max_chars,
            });
        }
        Ok(Self {
            max_chars,
            overlap_chars,
        })
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            overlap_chars: DEFAULT_OVERLAP_CHARS,
        }
    }
}

/// The header prepended to every chunk of `file_path`.
pub fn chunk_header(file_path: &str) -> String {
    format!("File: {file_path}\n\n")
}

/// Split `text` into overlapping chunks tagged with `file_path`.
///
/// # Guarantees
///
/// - At least one chunk is returned, even for empty text.
/// - Chunk indices are contiguous: `0, 1, …, N-1`.
/// - Every body is at most `max_chars` chars.
/// - `chunks[i + 1].start == chunks[i].end - overlap_chars`.
/// - The first chunk starts at 0 and the last ends at the text length.
pub fn chunk_file(text: &str, file_path: &str, config: &ChunkerConfig) -> Vec<Chunk> {
    // Byte offset of every char, plus the end of the text.
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = offsets.len() - 1;
    let max = config.max_chars;
    let overlap = config.overlap_chars;

    if total <= max {
        return vec![make_chunk(text, file_path, 0, 0, total, &offsets)];
    }

    let min_break = (max / 2).max(overlap);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < total {
        let mut end = (start + max).min(total);
        if end < total {
            if let Some(newline) = last_newline(text, &offsets, start, end) {
                if newline > start + min_break {
                    end = newline;
                }
            }
        }

        chunks.push(make_chunk(
            text,
            file_path,
            chunks.len(),
            start,
            end,
            &offsets,
        ));

        start = if end < total { end - overlap } else { end };
    }

    chunks
}

/// Char index of the last `\n` in `[start, end)`, if any.
fn last_newline(text: &str, offsets: &[usize], start: usize, end: usize) -> Option<usize> {
    let base = offsets[start];
    text[base..offsets[end]]
        .rfind('\n')
        .and_then(|rel| offsets.binary_search(&(base + rel)).ok())
}

fn make_chunk(
    text: &str,
    file_path: &str,
    index: usize,
    start: usize,
    end: usize,
    offsets: &[usize],
) -> Chunk {
    let mut rendered = chunk_header(file_path);
    rendered.push_str(&text[offsets[start]..offsets[end]]);

    Chunk {
        file_path: file_path.to_string(),
        chunk_index: index,
        text: rendered,
        start,
        end,
    }
}
