//! Exact cosine strategy
//!
//! Loads candidate embeddings filtered by agent and activity, computes
//! cosine similarity in memory, sorts. Exact by construction; the reference
//! semantics the native index must agree with.

use crate::embedding::cosine_similarity;
use crate::error::Result;

use super::{finalize, CandidateSource, ScoredId, SearchScope};

/// In-memory exact cosine ranking
pub struct ExactCosineStrategy;

impl ExactCosineStrategy {
    /// Score every in-scope candidate against `query_vector`.
    ///
    /// The score is the cosine similarity floored at zero, matching the
    /// native strategy's `1 - cosine_distance` on unit vectors.
    pub fn search(
        &self,
        source: &dyn CandidateSource,
        query_vector: &[f32],
        scope: &SearchScope,
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<ScoredId>> {
        let candidates = source.vector_candidates(scope)?;
        let hits = candidates
            .into_iter()
            .filter(|candidate| candidate.vector.len() == query_vector.len())
            .map(|candidate| ScoredId {
                score: f64::from(cosine_similarity(query_vector, &candidate.vector)).max(0.0),
                id: candidate.id,
            })
            .collect();
        Ok(finalize(hits, threshold, limit))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::search::{KeywordCandidate, VectorCandidate};

    use super::*;

    struct FixedSource {
        rows: Vec<VectorCandidate>,
    }

    impl CandidateSource for FixedSource {
        fn vector_candidates(&self, _scope: &SearchScope) -> Result<Vec<VectorCandidate>> {
            Ok(self.rows.clone())
        }

        fn keyword_candidates(
            &self,
            _keywords: &[String],
            _scope: &SearchScope,
        ) -> Result<Vec<KeywordCandidate>> {
            Ok(vec![])
        }

        fn native_search(
            &self,
            _vector: &[f32],
            _scope: &SearchScope,
            _limit: usize,
        ) -> Result<Option<Vec<ScoredId>>> {
            Ok(None)
        }
    }

    fn candidate(id: &str, vector: Vec<f32>) -> VectorCandidate {
        VectorCandidate { id: id.into(), vector }
    }

    #[allow(dead_code)]
    fn keyword_candidate(id: &str) -> KeywordCandidate {
        KeywordCandidate {
            id: id.into(),
            content: String::new(),
            confidence: 0.0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn ranks_by_cosine() {
        let source = FixedSource {
            rows: vec![
                candidate("exact", vec![1.0, 0.0]),
                candidate("close", vec![0.9, 0.1]),
                candidate("orthogonal", vec![0.0, 1.0]),
            ],
        };
        let hits = ExactCosineStrategy
            .search(&source, &[1.0, 0.0], &SearchScope::default(), 0.0, 10)
            .unwrap();
        assert_eq!(hits[0].id, "exact");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].id, "close");
        assert_eq!(hits[2].id, "orthogonal");
    }

    #[test]
    fn threshold_and_limit_apply() {
        let source = FixedSource {
            rows: vec![
                candidate("a", vec![1.0, 0.0]),
                candidate("b", vec![0.8, 0.6]),
                candidate("c", vec![0.0, 1.0]),
            ],
        };
        let hits = ExactCosineStrategy
            .search(&source, &[1.0, 0.0], &SearchScope::default(), 0.5, 1)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[test]
    fn opposite_vectors_floor_at_zero() {
        let source = FixedSource {
            rows: vec![candidate("anti", vec![-1.0, 0.0])],
        };
        let hits = ExactCosineStrategy
            .search(&source, &[1.0, 0.0], &SearchScope::default(), 0.0, 10)
            .unwrap();
        assert_eq!(hits[0].score, 0.0);
    }

    #[test]
    fn dimension_mismatch_rows_skipped() {
        let source = FixedSource {
            rows: vec![candidate("short", vec![1.0])],
        };
        let hits = ExactCosineStrategy
            .search(&source, &[1.0, 0.0], &SearchScope::default(), 0.0, 10)
            .unwrap();
        assert!(hits.is_empty());
    }
}
