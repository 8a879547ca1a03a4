//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is everything ingestion and answering need
//! from a similarity store: bulk reset, batched insert, top-k cosine
//! query, and a count. [`memory::InMemoryIndex`] is the brute-force
//! implementation used by every session.
//!
//! An index holds exactly one repository's data at a time. It is owned
//! by a single [`RepoSession`](crate::session::RepoSession), so mutation
//! takes `&mut self` and no interior locking is needed.

pub mod memory;

use thiserror::Error;

use crate::models::{IndexEntry, SearchHit};

/// Rejected index writes. A failed [`add`](VectorIndex::add) leaves the
/// index unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("entry {id} has dimension {got}, index expects {expected}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        got: usize,
    },
    #[error("duplicate entry id: {0}")]
    DuplicateId(String),
    #[error("entry {0} has an empty vector")]
    EmptyVector(String),
}

/// Similarity store over `(id, vector, document, metadata)` entries.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`reset`](VectorIndex::reset) | Drop every entry (start of each ingestion) |
/// | [`add`](VectorIndex::add) | Append a batch, all-or-nothing |
/// | [`query`](VectorIndex::query) | Top-k by cosine similarity, best first |
/// | [`count`](VectorIndex::count) | Number of entries |
pub trait VectorIndex: Send + Sync {
    fn reset(&mut self);

    /// Append `entries`. Ids must be unique across the index and all
    /// vectors must share one dimensionality.
    fn add(&mut self, entries: Vec<IndexEntry>) -> Result<(), IndexError>;

    /// Return the `k` entries most similar to `query`, best first.
    ///
    /// `k` is clamped to [`count`](VectorIndex::count); an empty index
    /// yields an empty result. Equal scores keep insertion order.
    fn query(&self, query: &[f32], k: usize) -> Vec<SearchHit>;

    fn count(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.count() == 0
    }
}
