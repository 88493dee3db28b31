//! Deterministic fallback embedder
//!
//! Hashes the text into a seed, expands the seed into pseudo-random signed
//! components (one splitmix64 step per dimension), then L2-normalizes. The
//! same text always maps to the same unit vector, so equality of content
//! still implies maximal cosine similarity. Used only when no real model is
//! configured.

use async_trait::async_trait;

use crate::error::{MemoryError, Result};

use super::{Embedding, EmbeddingProvider};

/// FNV-1a 64-bit hash of the input text
fn fnv1a(text: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for byte in text.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// One splitmix64 step; decorrelates consecutive dimension seeds
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Hash-seeded unit-norm embedder
pub struct DeterministicEmbedder {
    dimensions: usize,
}

impl DeterministicEmbedder {
    /// Create an embedder producing vectors of the given dimension
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Synchronous core, shared with the async trait impl
    pub fn embed_sync(&self, text: &str) -> Result<Embedding> {
        if text.trim().is_empty() {
            return Err(MemoryError::EmbeddingUnavailable(
                "cannot embed empty text".into(),
            ));
        }
        let mut state = fnv1a(text);
        let components: Vec<f32> = (0..self.dimensions)
            .map(|_| {
                let bits = splitmix64(&mut state);
                // Signed value in [-1, 1)
                (bits >> 11) as f32 / (1u64 << 53) as f32 * 2.0 - 1.0
            })
            .collect();
        Ok(Embedding::unit(components))
    }
}

#[async_trait]
impl EmbeddingProvider for DeterministicEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.embed_sync(text)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn is_deterministic(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_same_vector() {
        let embedder = DeterministicEmbedder::new(128);
        let a = embedder.embed_sync("The sky is blue.").unwrap();
        let b = embedder.embed_sync("The sky is blue.").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_text_different_vector() {
        let embedder = DeterministicEmbedder::new(128);
        let a = embedder.embed_sync("The sky is blue.").unwrap();
        let b = embedder.embed_sync("The grass is green.").unwrap();
        assert!(a.cosine_similarity(&b) < 0.99);
    }

    #[test]
    fn vectors_are_unit_norm() {
        let embedder = DeterministicEmbedder::new(1536);
        let e = embedder.embed_sync("norm check").unwrap();
        assert_eq!(e.dimensions, 1536);
        assert!(e.is_unit());
        // Self-similarity is 1 within tolerance (round-trip law)
        assert!((e.cosine_similarity(&e) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn empty_text_is_unavailable() {
        let embedder = DeterministicEmbedder::new(64);
        let err = embedder.embed_sync("   ").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::EmbeddingUnavailable);
    }

    #[test]
    fn provider_flags_deterministic() {
        let embedder = DeterministicEmbedder::new(64);
        assert!(embedder.is_deterministic());
        assert_eq!(embedder.dimensions(), 64);
    }
}
