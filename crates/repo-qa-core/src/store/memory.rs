//! In-memory [`VectorIndex`] implementation.
//!
//! Entries live in a `Vec` in insertion order. Queries are brute-force
//! cosine similarity over every entry followed by a stable sort, which
//! makes tie-breaking by insertion order fall out for free.

use std::collections::HashSet;

use crate::embedding::cosine_similarity;
use crate::models::{IndexEntry, SearchHit};

use super::{IndexError, VectorIndex};

#[derive(Debug, Default)]
pub struct InMemoryIndex {
    entries: Vec<IndexEntry>,
    ids: HashSet<String>,
    dims: Option<usize>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dimensionality fixed by the first inserted entry, if any.
    pub fn dims(&self) -> Option<usize> {
        self.dims
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    fn validate(&self, entries: &[IndexEntry]) -> Result<Option<usize>, IndexError> {
        let mut dims = self.dims;
        let mut batch_ids = HashSet::with_capacity(entries.len());

        for e in entries {
            if e.vector.is_empty() {
                return Err(IndexError::EmptyVector(e.id.clone()));
            }
            match dims {
                Some(d) if d != e.vector.len() => {
                    return Err(IndexError::DimensionMismatch {
                        id: e.id.clone(),
                        expected: d,
                        got: e.vector.len(),
                    });
                }
                Some(_) => {}
                None => dims = Some(e.vector.len()),
            }
            if self.ids.contains(&e.id) || !batch_ids.insert(e.id.as_str()) {
                return Err(IndexError::DuplicateId(e.id.clone()));
            }
        }

        Ok(dims)
    }
}

fn rank(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

impl VectorIndex for InMemoryIndex {
    fn reset(&mut self) {
        self.entries.clear();
        self.ids.clear();
        self.dims = None;
    }

    fn add(&mut self, entries: Vec<IndexEntry>) -> Result<(), IndexError> {
        let dims = self.validate(&entries)?;
        self.dims = dims;
        self.ids.extend(entries.iter().map(|e| e.id.clone()));
        self.entries.extend(entries);
        Ok(())
    }

    fn query(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        let k = k.min(self.entries.len());
        if k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query, &e.vector)))
            .collect();
        // Stable: equal scores keep insertion order. NaN ranks last.
        scored.sort_by(|a, b| rank(b.1).total_cmp(&rank(a.1)));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| {
                let e = &self.entries[i];
                SearchHit {
                    id: e.id.clone(),
                    score,
                    document: e.document.clone(),
                    metadata: e.metadata.clone(),
                }
            })
            .collect()
    }

    fn count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn entry(id: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            id: id.to_string(),
            vector,
            document: format!("doc {id}"),
            metadata: ChunkMetadata {
                file_path: format!("{id}.rs"),
                chunk: 0,
            },
        }
    }

    fn ids(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.id.as_str()).collect()
    }

    #[test]
    fn test_query_orders_best_first() {
        let mut index = InMemoryIndex::new();
        index
            .add(vec![
                entry("far", vec![0.0, 1.0]),
                entry("near", vec![1.0, 0.1]),
                entry("mid", vec![1.0, 1.0]),
            ])
            .unwrap();
        let hits = index.query(&[1.0, 0.0], 3);
        assert_eq!(ids(&hits), vec!["near", "mid", "far"]);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_k_clamped_to_count() {
        let mut index = InMemoryIndex::new();
        index
            .add(vec![entry("a", vec![1.0, 0.0]), entry("b", vec![0.0, 1.0])])
            .unwrap();
        let hits = index.query(&[0.0, 1.0], 10);
        assert_eq!(ids(&hits), vec!["b", "a"]);
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = InMemoryIndex::new();
        assert!(index.query(&[1.0, 0.0], 5).is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut index = InMemoryIndex::new();
        index
            .add(vec![
                entry("first", vec![1.0, 0.0]),
                entry("second", vec![2.0, 0.0]),
                entry("third", vec![3.0, 0.0]),
            ])
            .unwrap();
        let hits = index.query(&[1.0, 0.0], 2);
        assert_eq!(ids(&hits), vec!["first", "second"]);
    }

    #[test]
    fn test_nan_scores_rank_last() {
        let mut index = InMemoryIndex::new();
        index
            .add(vec![
                entry("broken", vec![f32::NAN, 1.0]),
                entry("near", vec![1.0, 0.1]),
                entry("also_broken", vec![1.0, f32::NAN]),
                entry("far", vec![0.0, 1.0]),
            ])
            .unwrap();
        let hits = index.query(&[1.0, 0.0], 4);
        assert_eq!(ids(&hits), vec!["near", "far", "broken", "also_broken"]);
        assert!(hits[2].score.is_nan());
    }

    #[test]
    fn test_reset_clears_entries_and_dims() {
        let mut index = InMemoryIndex::new();
        index.add(vec![entry("a", vec![1.0, 0.0])]).unwrap();
        index.reset();
        assert_eq!(index.count(), 0);
        assert_eq!(index.dims(), None);
        // Same id and a new dimensionality are accepted after reset.
        index.add(vec![entry("a", vec![1.0, 0.0, 0.0])]).unwrap();
        assert_eq!(index.dims(), Some(3));
    }

    #[test]
    fn test_add_rejects_dimension_mismatch_atomically() {
        let mut index = InMemoryIndex::new();
        let err = index
            .add(vec![entry("a", vec![1.0, 0.0]), entry("b", vec![1.0])])
            .unwrap_err();
        assert_eq!(
            err,
            IndexError::DimensionMismatch {
                id: "b".to_string(),
                expected: 2,
                got: 1
            }
        );
        assert_eq!(index.count(), 0);
        assert_eq!(index.dims(), None);
    }

    #[test]
    fn test_add_rejects_duplicate_ids() {
        let mut index = InMemoryIndex::new();
        index.add(vec![entry("a", vec![1.0])]).unwrap();
        assert_eq!(
            index.add(vec![entry("a", vec![2.0])]),
            Err(IndexError::DuplicateId("a".to_string()))
        );
        assert_eq!(
            index.add(vec![entry("b", vec![2.0]), entry("b", vec![3.0])]),
            Err(IndexError::DuplicateId("b".to_string()))
        );
        assert_eq!(index.count(), 1);
    }

    #[test]
    fn test_add_rejects_empty_vector() {
        let mut index = InMemoryIndex::new();
        assert_eq!(
            index.add(vec![entry("a", Vec::new())]),
            Err(IndexError::EmptyVector("a".to_string()))
        );
    }
}
