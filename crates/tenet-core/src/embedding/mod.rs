//! Embedding generation
//!
//! One pluggable contract: text in, unit-norm vector of the process-wide
//! dimension out. The deterministic hash embedder is always available and is
//! used when no real model is configured; the fastembed-backed provider
//! lives behind the `embeddings` feature.

mod deterministic;

#[cfg(feature = "embeddings")]
#[cfg_attr(docsrs, doc(cfg(feature = "embeddings")))]
mod local;

pub use deterministic::DeterministicEmbedder;

#[cfg(feature = "embeddings")]
pub use local::FastembedProvider;

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lru::LruCache;

use crate::error::{MemoryError, Result};

// ============================================================================
// EMBEDDING TYPE
// ============================================================================

/// Unit-norm tolerance: |L2 - 1| must stay within this bound
pub const NORM_TOLERANCE: f32 = 1e-6;

/// A semantic embedding vector
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    /// The vector components
    pub vector: Vec<f32>,
    /// Number of dimensions
    pub dimensions: usize,
}

impl Embedding {
    /// Wrap a vector
    pub fn new(vector: Vec<f32>) -> Self {
        let dimensions = vector.len();
        Self { vector, dimensions }
    }

    /// Wrap and L2-normalize a vector
    pub fn unit(mut vector: Vec<f32>) -> Self {
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        Self::new(vector)
    }

    /// Whether the vector is unit length within tolerance
    pub fn is_unit(&self) -> bool {
        let norm = self.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        (norm - 1.0).abs() <= NORM_TOLERANCE * 10.0
    }

    /// Cosine similarity with another embedding; 0.0 on dimension mismatch
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        cosine_similarity(&self.vector, &other.vector)
    }

    /// Serialize to little-endian f32 bytes for BLOB storage
    pub fn to_bytes(&self) -> Vec<u8> {
        self.vector.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize from little-endian f32 bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() % 4 != 0 {
            return None;
        }
        let vector: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Some(Self::new(vector))
    }
}

// ============================================================================
// PROVIDER CONTRACT
// ============================================================================

/// Pluggable embedding generator
///
/// Implementations must return unit-normalized vectors of a fixed dimension.
/// Failures surface as [`MemoryError::EmbeddingUnavailable`]; callers proceed
/// without an embedding.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Process-wide vector dimension
    fn dimensions(&self) -> usize;

    /// True for the hash-based fallback; real models return false
    fn is_deterministic(&self) -> bool {
        false
    }
}

// ============================================================================
// QUERY CACHE
// ============================================================================

/// LRU cache in front of a provider for repeated query texts
pub struct QueryEmbeddingCache {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl QueryEmbeddingCache {
    /// Wrap a provider with a cache of the given capacity (min 1)
    pub fn new(provider: Arc<dyn EmbeddingProvider>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity >= 1");
        Self {
            provider,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Embed through the cache
    pub async fn embed(&self, text: &str) -> Result<Embedding> {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(vector) = cache.get(text) {
                return Ok(Embedding::new(vector.clone()));
            }
        }
        let embedding = self.provider.embed(text).await?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(text.to_string(), embedding.vector.clone());
        }
        Ok(embedding)
    }

    /// The wrapped provider
    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }
}

// ============================================================================
// SIMILARITY FUNCTIONS
// ============================================================================

/// Cosine similarity between two vectors; 0.0 on length mismatch
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = (norm_a * norm_b).sqrt();
    if denominator > 0.0 { dot / denominator } else { 0.0 }
}

/// Dot product between two vectors
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Map a cosine similarity in [-1, 1] onto the score scale [0, 1]
#[inline]
pub fn cosine_to_score(cosine: f32) -> f64 {
    (((cosine + 1.0) / 2.0) as f64).clamp(0.0, 1.0)
}

/// Validate that a stored blob is a complete vector of the expected
/// dimension. Partial embeddings are never accepted.
pub fn decode_checked(bytes: &[u8], expected_dims: usize) -> Result<Embedding> {
    let embedding = Embedding::from_bytes(bytes).ok_or_else(|| {
        MemoryError::Internal("embedding blob length is not a multiple of 4".into())
    })?;
    if embedding.dimensions != expected_dims {
        return Err(MemoryError::Internal(format!(
            "embedding has {} dimensions, expected {}",
            embedding.dimensions, expected_dims
        )));
    }
    Ok(embedding)
}

// ============================================================================
// TESTS
// ============================================================================
