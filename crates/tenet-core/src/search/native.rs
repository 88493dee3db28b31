//! Storage-native vector strategy (USearch HNSW)
//!
//! The store maintains one [`NativeVectorIndex`] per entity table and serves
//! `native_search` from it. Scores are `1 - cosine_distance`, floored at
//! zero so the scale matches the exact strategy on unit vectors.

use std::collections::HashMap;

use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::error::{MemoryError, Result};

use super::ScoredId;

/// HNSW connectivity parameter
const CONNECTIVITY: usize = 16;

/// HNSW expansion factor for index building
const EXPANSION_ADD: usize = 128;

/// HNSW expansion factor for search
const EXPANSION_SEARCH: usize = 64;

/// In-process HNSW index keyed by entity id
pub struct NativeVectorIndex {
    index: Index,
    dimensions: usize,
    key_to_slot: HashMap<String, u64>,
    slot_to_key: HashMap<u64, String>,
    next_slot: u64,
}

impl NativeVectorIndex {
    /// Create an empty index for vectors of the given dimension
    pub fn new(dimensions: usize) -> Result<Self> {
        let options = IndexOptions {
            dimensions,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: CONNECTIVITY,
            expansion_add: EXPANSION_ADD,
            expansion_search: EXPANSION_SEARCH,
            multi: false,
        };
        let index = Index::new(&options)
            .map_err(|e| MemoryError::Internal(format!("vector index creation failed: {e}")))?;
        Ok(Self {
            index,
            dimensions,
            key_to_slot: HashMap::new(),
            slot_to_key: HashMap::new(),
            next_slot: 0,
        })
    }

    /// Number of indexed vectors
    pub fn len(&self) -> usize {
        self.index.size()
    }

    /// Whether the index holds no vectors
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace the vector for `key`
    pub fn upsert(&mut self, key: &str, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(MemoryError::Internal(format!(
                "vector has {} dimensions, index expects {}",
                vector.len(),
                self.dimensions
            )));
        }

        if let Some(&slot) = self.key_to_slot.get(key) {
            self.index
                .remove(slot)
                .map_err(|e| MemoryError::Internal(format!("vector index remove failed: {e}")))?;
            self.reserve_for(self.index.size() + 1)?;
            self.index
                .add(slot, vector)
                .map_err(|e| MemoryError::Internal(format!("vector index add failed: {e}")))?;
            return Ok(());
        }

        self.reserve_for(self.index.size() + 1)?;
        let slot = self.next_slot;
        self.next_slot += 1;
        self.index
            .add(slot, vector)
            .map_err(|e| MemoryError::Internal(format!("vector index add failed: {e}")))?;
        self.key_to_slot.insert(key.to_string(), slot);
        self.slot_to_key.insert(slot, key.to_string());
        Ok(())
    }

    /// Remove `key`; returns whether it was present
    pub fn remove(&mut self, key: &str) -> Result<bool> {
        match self.key_to_slot.remove(key) {
            Some(slot) => {
                self.slot_to_key.remove(&slot);
                self.index
                    .remove(slot)
                    .map_err(|e| MemoryError::Internal(format!("vector index remove failed: {e}")))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Nearest neighbors of `query`, scored `1 - cosine_distance` floored at 0
    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<ScoredId>> {
        if query.len() != self.dimensions {
            return Err(MemoryError::Internal(format!(
                "query has {} dimensions, index expects {}",
                query.len(),
                self.dimensions
            )));
        }
        if self.is_empty() {
            return Ok(vec![]);
        }

        let matches = self
            .index
            .search(query, limit)
            .map_err(|e| MemoryError::Internal(format!("vector index search failed: {e}")))?;

        let mut hits = Vec::with_capacity(matches.keys.len());
        for (slot, distance) in matches.keys.iter().zip(matches.distances.iter()) {
            if let Some(key) = self.slot_to_key.get(slot) {
                hits.push(ScoredId {
                    id: key.clone(),
                    score: f64::from(1.0 - distance).max(0.0),
                });
            }
        }
        Ok(hits)
    }

    // usearch segfaults on add without reserved capacity
    fn reserve_for(&self, wanted: usize) -> Result<()> {
        if wanted > self.index.capacity() {
            let new_capacity = std::cmp::max(self.index.capacity() * 2, 16).max(wanted);
            self.index
                .reserve(new_capacity)
                .map_err(|e| MemoryError::Internal(format!("vector index reserve failed: {e}")))?;
        }
        Ok(())
    }
}

/// Marker type for the native strategy; the work happens in the store's
/// `native_search`, which consults its [`NativeVectorIndex`]
pub struct NativeVectorStrategy;

// ============================================================================
// TESTS
// ============================================================================
