//! Embedding trait, an offline hashing embedder, and vector utilities.
//!
//! The [`Embedder`] trait is the one seam through which both chunk text
//! and query text become vectors. Ingestion and answering must share the
//! same instance so the two live in the same vector space.
//!
//! Network-backed implementations (OpenAI, Ollama, fastembed) live in the
//! `repo-qa` app crate. [`HashingEmbedder`] is pure and deterministic, so
//! it is available everywhere, including tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Maps text to fixed-dimension vectors.
///
/// Implementations must be deterministic for identical input and must
/// return exactly one vector per input, in input order, each of length
/// [`dims`](Embedder::dims).
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text, typically a query.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty embedding response"))
    }
}

/// Deterministic feature-hashing embedder.
///
/// Lower-cases the text, splits it into alphanumeric/underscore tokens,
/// and adds `±1` to the bucket chosen by the token's SHA-256 digest. The
/// result is L2-normalized. Texts sharing vocabulary land close together
/// under cosine similarity, which is enough for offline use and tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIMS: usize = 256;

    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        let lower = text.to_lowercase();
        let tokens = lower
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|t| !t.is_empty());

        for token in tokens {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let idx = (u64::from_le_bytes(bucket) % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }

        normalize(&mut v);
        v
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMS)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hashing"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// Scale `v` to unit length in place. Zero vectors are left untouched.
pub fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm >= f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or a
/// zero-length vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
