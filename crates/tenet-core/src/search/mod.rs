//! Similarity search strategies
//!
//! Three interchangeable strategies with one observable contract: scores in
//! [0, 1], descending, filtered by threshold, capped at the requested limit.
//!
//! - Native: the storage layer's own vector index (feature `vector-search`)
//! - Exact cosine: load candidate embeddings, dot-product in memory
//! - Keyword: stop-word-stripped keyword fetch rescored with Jaccard
//!
//! [`SimilarityEngine`] picks a strategy per query: `auto` probes the
//! candidate source and prefers native, then vector, then text. Text queries
//! embed through the query cache when a provider is configured; the keyword
//! path never touches the embedding provider.

mod keyword;
mod vector;

#[cfg(feature = "vector-search")]
#[cfg_attr(docsrs, doc(cfg(feature = "vector-search")))]
mod native;

pub use keyword::{extract_keywords, jaccard_similarity, KeywordStrategy, STOP_WORDS};
pub use vector::ExactCosineStrategy;

#[cfg(feature = "vector-search")]
pub use native::{NativeVectorIndex, NativeVectorStrategy};

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::{SimilarityConfig, StrategyKind};
use crate::embedding::QueryEmbeddingCache;
use crate::error::Result;

// ============================================================================
// SEARCH CONTRACT
// ============================================================================

/// A similarity query: raw text or a ready-made vector
#[derive(Debug, Clone)]
pub enum Query<'a> {
    /// Natural-language query text
    Text(&'a str),
    /// Pre-computed query vector
    Vector(&'a [f32]),
}

/// Scoping applied before scoring
#[derive(Debug, Clone, Default)]
pub struct SearchScope {
    /// Restrict to one agent's space; `None` means cross-agent
    pub agent_id: Option<String>,
    /// Include deactivated entities
    pub include_inactive: bool,
}

impl SearchScope {
    /// Scope to a single agent, active entities only
    pub fn agent(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: Some(agent_id.into()),
            include_inactive: false,
        }
    }
}

/// One scored search hit
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredId {
    /// Entity id
    pub id: String,
    /// Similarity score in [0, 1]
    pub score: f64,
}

/// A candidate row for vector scoring
#[derive(Debug, Clone)]
pub struct VectorCandidate {
    /// Entity id
    pub id: String,
    /// Stored embedding
    pub vector: Vec<f32>,
}

/// A candidate row for keyword rescoring
#[derive(Debug, Clone)]
pub struct KeywordCandidate {
    /// Entity id
    pub id: String,
    /// Stored text (memory content or belief statement)
    pub content: String,
    /// Confidence used for tie-breaking
    pub confidence: f64,
    /// Creation time used for tie-breaking
    pub created_at: DateTime<Utc>,
}

/// What a store exposes to the strategies
///
/// Memory and belief repositories both implement this; the strategies stay
/// ignorant of which entity they are ranking.
pub trait CandidateSource: Send + Sync {
    /// All `(id, embedding)` rows in scope
    fn vector_candidates(&self, scope: &SearchScope) -> Result<Vec<VectorCandidate>>;

    /// Rows whose text contains at least one of the keywords (`LIKE %kw%`
    /// semantics, case-insensitive)
    fn keyword_candidates(
        &self,
        keywords: &[String],
        scope: &SearchScope,
    ) -> Result<Vec<KeywordCandidate>>;

    /// Storage-native vector search, or `Ok(None)` when the store has no
    /// native index
    fn native_search(
        &self,
        vector: &[f32],
        scope: &SearchScope,
        limit: usize,
    ) -> Result<Option<Vec<ScoredId>>>;
}

/// Truncate, threshold-filter, and order a scored result list.
///
/// Shared tail of every strategy so the external contract cannot drift.
pub(crate) fn finalize(mut hits: Vec<ScoredId>, threshold: f64, limit: usize) -> Vec<ScoredId> {
    hits.retain(|hit| hit.score >= threshold);
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(limit);
    hits
}

// ============================================================================
// SIMILARITY ENGINE
// ============================================================================

/// Strategy selector and entry point for similarity queries
pub struct SimilarityEngine {
    config: SimilarityConfig,
    query_cache: Option<Arc<QueryEmbeddingCache>>,
}

impl SimilarityEngine {
    /// Build an engine. `query_cache` is `None` when embeddings are disabled;
    /// text queries then always take the keyword path.
    pub fn new(config: SimilarityConfig, query_cache: Option<Arc<QueryEmbeddingCache>>) -> Self {
        Self { config, query_cache }
    }

    /// The configured strategy kind
    pub fn kind(&self) -> StrategyKind {
        self.config.strategy
    }

    /// Run a similarity query against `source`.
    ///
    /// `limit` is additionally capped by `similarity.max_results`.
    pub async fn search(
        &self,
        source: &dyn CandidateSource,
        query: Query<'_>,
        scope: &SearchScope,
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<ScoredId>> {
        let limit = limit.min(self.config.max_results);
        match self.config.strategy {
            StrategyKind::Text => self.keyword_search(source, &query, scope, threshold, limit),
            StrategyKind::Vector => {
                match self.resolve_vector(&query).await? {
                    Some(vector) => {
                        ExactCosineStrategy.search(source, &vector, scope, threshold, limit)
                    }
                    None => self.keyword_search(source, &query, scope, threshold, limit),
                }
            }
            StrategyKind::Native => {
                match self.resolve_vector(&query).await? {
                    Some(vector) => {
                        if let Some(hits) = source.native_search(&vector, scope, limit)? {
                            Ok(finalize(hits, threshold, limit))
                        } else {
                            // Store has no native index; fall through to exact
                            ExactCosineStrategy.search(source, &vector, scope, threshold, limit)
                        }
                    }
                    None => self.keyword_search(source, &query, scope, threshold, limit),
                }
            }
            StrategyKind::Auto => {
                // Probe: native when the store offers it, else exact cosine
                // when a vector can be produced, else keyword.
                match self.resolve_vector(&query).await? {
                    Some(vector) => {
                        if let Some(hits) = source.native_search(&vector, scope, limit)? {
                            Ok(finalize(hits, threshold, limit))
                        } else {
                            ExactCosineStrategy.search(source, &vector, scope, threshold, limit)
                        }
                    }
                    None => self.keyword_search(source, &query, scope, threshold, limit),
                }
            }
        }
    }

    fn keyword_search(
        &self,
        source: &dyn CandidateSource,
        query: &Query<'_>,
        scope: &SearchScope,
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<ScoredId>> {
        match query {
            Query::Text(text) => KeywordStrategy.search(source, text, scope, threshold, limit),
            // A vector query with no vector path available cannot be
            // rescored by keywords; return nothing rather than guessing.
            Query::Vector(_) => Ok(vec![]),
        }
    }

    /// Produce a query vector when possible: pass-through for vector
    /// queries, embed-with-cache for text queries when a provider exists.
    async fn resolve_vector(&self, query: &Query<'_>) -> Result<Option<Vec<f32>>> {
        match query {
            Query::Vector(vector) => Ok(Some(vector.to_vec())),
            Query::Text(text) => match &self.query_cache {
                Some(cache) => match cache.embed(text).await {
                    Ok(embedding) => Ok(Some(embedding.vector)),
                    Err(err) => {
                        tracing::warn!(error = %err, "query embedding failed, degrading to keyword search");
                        Ok(None)
                    }
                },
                None => Ok(None),
            },
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
