//! Store facades
//!
//! [`MemoryStore`] and [`BeliefStore`] wrap the repositories with embedding
//! generation and similarity search, giving callers the component-level
//! operations (encode-and-store, similar, backfill) while the repos stay
//! pure persistence.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingProvider;
use crate::error::{MemoryError, Result};
use crate::model::{Belief, BeliefConflict, CategoryLabel, FilterOptions, MemoryInput, MemoryRecord};
use crate::search::{Query, ScoredId, SearchScope, SimilarityEngine};
use crate::storage::{BeliefRepo, MemoryRepo};

// ============================================================================
// MEMORY STORE
// ============================================================================

/// Result of an embedding backfill sweep
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingBackfill {
    /// Embeddings generated and attached
    pub successful: i64,
    /// Records whose embedding failed
    pub failed: i64,
    /// Records skipped (already embedded or provider missing)
    pub skipped: i64,
    /// Error messages for the failures
    pub errors: Vec<String>,
}

/// Memory encoding and retrieval (C3)
pub struct MemoryStore {
    repo: Arc<dyn MemoryRepo>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    similarity: Arc<SimilarityEngine>,
    embed_deadline: Duration,
}

impl MemoryStore {
    /// Wire up the store. `embedder` is `None` when embeddings are disabled.
    pub fn new(
        repo: Arc<dyn MemoryRepo>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        similarity: Arc<SimilarityEngine>,
        embed_deadline: Duration,
    ) -> Self {
        Self {
            repo,
            embedder,
            similarity,
            embed_deadline,
        }
    }

    /// The underlying repository
    pub fn repo(&self) -> &Arc<dyn MemoryRepo> {
        &self.repo
    }

    /// Allocate an id, stamp timestamps, optionally embed, and persist.
    ///
    /// Embedding failure is non-fatal: the record is stored without a
    /// vector and the caller can inspect `embedding.is_none()`. A storage
    /// failure is fatal and nothing is persisted.
    pub async fn encode_and_store(
        &self,
        input: &MemoryInput,
        category: CategoryLabel,
    ) -> Result<MemoryRecord> {
        let mut record = MemoryRecord::encode(input, category);

        if let Some(embedder) = &self.embedder {
            match tokio::time::timeout(self.embed_deadline, embedder.embed(&record.content)).await
            {
                Ok(Ok(embedding)) => record.embedding = Some(embedding.vector),
                Ok(Err(err)) => {
                    tracing::warn!(
                        memory_id = %record.id,
                        error = %err,
                        "memory stored without embedding"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        memory_id = %record.id,
                        "embedding timed out, memory stored without it"
                    );
                }
            }
        }

        self.repo.insert(&record)?;
        tracing::debug!(
            memory_id = %record.id,
            agent_id = %record.agent_id,
            embedded = record.embedding.is_some(),
            "memory encoded"
        );
        Ok(record)
    }

    /// Fetch a record, optionally advancing its access tracking
    pub fn get(&self, id: &str, track_access: bool) -> Result<Option<MemoryRecord>> {
        let record = self.repo.get(id)?;
        if track_access && record.is_some() {
            // Best effort: a lost increment only coalesces the count
            if let Err(err) = self.repo.increment_access(id) {
                tracing::warn!(memory_id = %id, error = %err, "access tracking failed");
            }
        }
        Ok(record)
    }

    /// Fetch many records; missing ids omitted
    pub fn get_many(&self, ids: &[String]) -> Result<Vec<MemoryRecord>> {
        self.repo.get_many(ids)
    }

    /// Filtered listing
    pub fn find_by_agent(
        &self,
        agent_id: &str,
        filter: &FilterOptions,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>> {
        self.repo.find_by_agent(agent_id, filter, limit)
    }

    /// Delete one record
    pub fn delete(&self, id: &str) -> Result<bool> {
        self.repo.delete(id)
    }

    /// Delete many records
    pub fn delete_many(&self, ids: &[String]) -> Result<usize> {
        self.repo.delete_many(ids)
    }

    /// Similarity search over memories, hydrated with scores
    pub async fn similar(
        &self,
        query: Query<'_>,
        agent_id: Option<&str>,
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<(MemoryRecord, f64)>> {
        let scope = SearchScope {
            agent_id: agent_id.map(String::from),
            include_inactive: false,
        };
        let hits = self
            .similarity
            .search(self.repo.as_candidate_source(), query, &scope, threshold, limit)
            .await?;
        self.hydrate(hits)
    }

    fn hydrate(&self, hits: Vec<ScoredId>) -> Result<Vec<(MemoryRecord, f64)>> {
        let ids: Vec<String> = hits.iter().map(|h| h.id.clone()).collect();
        let records = self.repo.get_many(&ids)?;
        Ok(records
            .into_iter()
            .filter_map(|record| {
                hits.iter()
                    .find(|h| h.id == record.id)
                    .map(|h| (record, h.score))
            })
            .collect())
    }

    /// Embed records that are missing vectors, up to `limit` per sweep
    pub async fn backfill_embeddings(
        &self,
        agent_id: Option<&str>,
        limit: usize,
    ) -> Result<EmbeddingBackfill> {
        let mut report = EmbeddingBackfill::default();
        let Some(embedder) = &self.embedder else {
            report.skipped = self.repo.count(agent_id)? - self.repo.count_with_embeddings(agent_id)?;
            return Ok(report);
        };

        for record in self.repo.find_missing_embeddings(agent_id, limit)? {
            match tokio::time::timeout(self.embed_deadline, embedder.embed(&record.content)).await
            {
                Ok(Ok(embedding)) => match self.repo.set_embedding(&record.id, &embedding) {
                    Ok(()) => report.successful += 1,
                    Err(err) => {
                        report.failed += 1;
                        report.errors.push(format!("{}: {err}", record.id));
                    }
                },
                Ok(Err(err)) => {
                    report.failed += 1;
                    report.errors.push(format!("{}: {err}", record.id));
                }
                Err(_) => {
                    report.failed += 1;
                    report.errors.push(format!("{}: embedding timed out", record.id));
                }
            }
        }
        Ok(report)
    }
}

// ============================================================================
// BELIEF STORE
// ============================================================================

/// Belief retrieval and similarity (C4 facade)
pub struct BeliefStore {
    repo: Arc<dyn BeliefRepo>,
    similarity: Arc<SimilarityEngine>,
}

impl BeliefStore {
    /// Wire up the store
    pub fn new(repo: Arc<dyn BeliefRepo>, similarity: Arc<SimilarityEngine>) -> Self {
        Self { repo, similarity }
    }

    /// The underlying repository
    pub fn repo(&self) -> &Arc<dyn BeliefRepo> {
        &self.repo
    }

    /// Fetch one belief
    pub fn get(&self, id: &str) -> Result<Option<Belief>> {
        self.repo.get(id)
    }

    /// Listing for one agent
    pub fn find_by_agent(
        &self,
        agent_id: &str,
        include_inactive: bool,
        limit: usize,
    ) -> Result<Vec<Belief>> {
        self.repo.find_by_agent(agent_id, include_inactive, limit)
    }

    /// Similarity search over belief statements.
    ///
    /// Inactive beliefs stay out of the results unless `include_inactive`.
    pub async fn similar(
        &self,
        query: Query<'_>,
        agent_id: Option<&str>,
        threshold: f64,
        limit: usize,
        include_inactive: bool,
    ) -> Result<Vec<(Belief, f64)>> {
        let scope = SearchScope {
            agent_id: agent_id.map(String::from),
            include_inactive,
        };
        let hits = self
            .similarity
            .search(self.repo.as_candidate_source(), query, &scope, threshold, limit)
            .await?;

        let ids: Vec<String> = hits.iter().map(|h| h.id.clone()).collect();
        let beliefs = self.repo.get_many(&ids)?;
        Ok(beliefs
            .into_iter()
            .filter_map(|belief| {
                hits.iter()
                    .find(|h| h.id == belief.id)
                    .map(|h| (belief, h.score))
            })
            .collect())
    }

    /// Conflicts for one agent
    pub fn find_conflicts(&self, agent_id: &str, unresolved_only: bool)
        -> Result<Vec<BeliefConflict>> {
        self.repo.find_conflicts(agent_id, unresolved_only)
    }

    /// Resolve a pending conflict by hand (the manual-review path)
    pub fn resolve_conflict(
        &self,
        conflict_id: &str,
        resolution: crate::model::ConflictResolution,
        details: &str,
        confidence: f64,
    ) -> Result<BeliefConflict> {
        let mut conflict = self
            .repo
            .get_conflict(conflict_id)?
            .ok_or_else(|| MemoryError::NotFound(format!("conflict {conflict_id}")))?;
        conflict.resolve(resolution, details, confidence);
        self.repo.update_conflict(&conflict)?;
        Ok(conflict)
    }
}
