//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] capability that every embedding backend
//! implements, a deterministic [`HashEmbedder`] used for tests and offline
//! operation, plus pure helpers for the vector file encoding and cosine
//! similarity.
//!
//! Network-backed providers (OpenAI, Ollama) live in the `recall` app crate.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::models::Vector;

/// A text → vector capability.
///
/// Implementations must be deterministic for a given input and model and
/// must return vectors of exactly [`dims`](EmbeddingProvider::dims)
/// components. Any failure aborts the enclosing ingestion or query.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vector>;
}

/// Embed `text` and verify the result has `expected_dims` components.
///
/// A wrong-length vector is reported as [`Error::Provider`].
pub async fn embed_checked(
    provider: &dyn EmbeddingProvider,
    text: &str,
    expected_dims: usize,
) -> Result<Vector> {
    let vector = provider.embed(text).await?;
    if vector.len() != expected_dims {
        return Err(Error::Provider(format!(
            "model {} returned {} dimensions, expected {}",
            provider.model_name(),
            vector.len(),
            expected_dims
        )));
    }
    Ok(vector)
}

/// Deterministic feature-hashing embedder.
///
/// Each lower-cased word is hashed with SHA-256 into a bucket and a sign;
/// the bucket counts are L2-normalized. Texts sharing words get positive
/// cosine similarity, which makes it usable without a model. Text with no
/// words embeds to the zero vector.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    /// Synchronous embedding, used by the async trait method.
    pub fn embed_sync(&self, text: &str) -> Vector {
        let mut v = vec![0.0f32; self.dims];
        if self.dims == 0 {
            return v;
        }
        for word in text.split_whitespace() {
            let word: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect();
            if word.is_empty() {
                continue;
            }
            let digest = Sha256::digest(word.as_bytes());
            let bucket = u64::from_le_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6],
                digest[7],
            ]) % self.dims as u64;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket as usize] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, text: &str) -> Result<Vector> {
        Ok(self.embed_sync(text))
    }
}

/// Encode a float vector as little-endian f32 bytes.
///
/// Component `i` occupies bytes `i*4..i*4+4`, producing `vec.len() × 4`
/// bytes. This is the on-disk vector file format.
///
/// # Example
///
/// ```rust
/// use recall_core::embedding::{vec_to_bytes, bytes_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let bytes = vec_to_bytes(&v);
/// assert_eq!(bytes.len(), 12); // 3 × 4 bytes
/// assert_eq!(bytes_to_vec(&bytes), Some(v));
/// ```
pub fn vec_to_bytes(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian f32 bytes back into a vector.
///
/// Returns `None` when the length is not a multiple of 4.
pub fn bytes_to_vec(bytes: &[u8]) -> Option<Vector> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal, or either vector is zero
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
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

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_bytes_little_endian_layout() {
        let bytes = vec_to_bytes(&[1.0f32, -2.0]);
        assert_eq!(&bytes[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..8], &(-2.0f32).to_le_bytes());
        assert_eq!(bytes_to_vec(&bytes), Some(vec![1.0, -2.0]));
    }

    #[test]
    fn test_bytes_to_vec_rejects_ragged_input() {
        assert_eq!(bytes_to_vec(&[0u8; 7]), None);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cosine_different_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_hash_embedder_deterministic_and_normalized() {
        let e = HashEmbedder::new(64);
        let a = e.embed_sync("The quick brown fox");
        let b = e.embed_sync("the QUICK brown fox!");
        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hash_embedder_shared_words_score_higher() {
        let e = HashEmbedder::new(256);
        let q = e.embed_sync("dragon castle");
        let near = e.embed_sync("the dragon guards the castle");
        let far = e.embed_sync("tax forms are due in april");
        assert!(cosine_similarity(&q, &near) > cosine_similarity(&q, &far));
    }

    #[test]
    fn test_hash_embedder_empty_text_is_zero() {
        let v = HashEmbedder::new(8).embed_sync("  ... ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_embed_checked_rejects_wrong_dims() {
        let e = HashEmbedder::new(4);
        let err = embed_checked(&e, "hello", 5).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Provider);
        assert_eq!(embed_checked(&e, "hello", 4).await.unwrap().len(), 4);
    }
}
