//! Belief reinforcement and conflict analysis
//!
//! The orchestrator behind ingestion: extract candidate beliefs from a
//! memory, match them against the agent's existing beliefs by semantic
//! similarity, then reinforce, weaken, resolve conflicts, or create new
//! beliefs. All belief writes go through the optimistic version guard with
//! the configured retry policy; a simulation twin makes the same decisions
//! without touching storage.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::{BrcaConfig, DeadlineConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::{MemoryError, Result};
use crate::extract::BeliefExtractor;
use crate::graph::KnowledgeGraph;
use crate::model::{
    Belief, BeliefConflict, BeliefProposal, BeliefRelationship, ConflictResolution,
    ConflictSeverity, MemoryRecord, RelationshipType,
};
use crate::retry::RetryPolicy;
use crate::search::{Query, SearchScope, SimilarityEngine};
use crate::storage::BeliefRepo;

// ============================================================================
// RESULT TYPE
// ============================================================================

/// Outcome of analyzing one memory against the agent's belief space
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeliefUpdateResult {
    /// Beliefs whose confidence was raised
    pub reinforced: Vec<Belief>,
    /// Beliefs weakened or deactivated by conflicts
    pub weakened: Vec<Belief>,
    /// Beliefs created for unmatched proposals
    pub new_beliefs: Vec<Belief>,
    /// Conflicts opened during the analysis, resolved or not
    pub conflicts: Vec<BeliefConflict>,
    /// Graph edges emitted (SUPERSEDES, REPLACES, ...)
    pub relationships: Vec<BeliefRelationship>,
    /// When the analysis finished
    pub analysis_timestamp: DateTime<Utc>,
    /// Mean post-update confidence of modified beliefs; 1.0 when nothing
    /// changed
    pub overall_confidence: f64,
    /// Wall-clock duration of the analysis
    pub processing_time_ms: i64,
}

impl BeliefUpdateResult {
    fn empty() -> Self {
        Self {
            reinforced: vec![],
            weakened: vec![],
            new_beliefs: vec![],
            conflicts: vec![],
            relationships: vec![],
            analysis_timestamp: Utc::now(),
            overall_confidence: 1.0,
            processing_time_ms: 0,
        }
    }

    /// Number of beliefs touched in any way
    pub fn total_modified(&self) -> usize {
        self.reinforced.len() + self.weakened.len() + self.new_beliefs.len()
    }

    fn finalize(&mut self, started: Instant) {
        let modified: Vec<f64> = self
            .reinforced
            .iter()
            .chain(self.weakened.iter())
            .chain(self.new_beliefs.iter())
            .map(|b| b.confidence)
            .collect();
        self.overall_confidence = if modified.is_empty() {
            1.0
        } else {
            modified.iter().sum::<f64>() / modified.len() as f64
        };
        self.analysis_timestamp = Utc::now();
        self.processing_time_ms = started.elapsed().as_millis() as i64;
    }
}

// ============================================================================
// ANALYZER
// ============================================================================

/// The belief reinforcement and conflict analyzer
pub struct BeliefAnalyzer {
    extractor: Arc<dyn BeliefExtractor>,
    beliefs: Arc<dyn BeliefRepo>,
    graph: Arc<KnowledgeGraph>,
    similarity: Arc<SimilarityEngine>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    config: BrcaConfig,
    deadlines: DeadlineConfig,
    retry: RetryPolicy,
}

/// One proposal's view of the belief that stands in for it (reinforced
/// match or freshly created), used as the source of conflict edges
enum NewSide {
    Reinforced(Belief),
    Created(Belief),
    None,
}

impl NewSide {
    fn belief(&self) -> Option<&Belief> {
        match self {
            NewSide::Reinforced(b) | NewSide::Created(b) => Some(b),
            NewSide::None => None,
        }
    }
}

impl BeliefAnalyzer {
    /// Wire up the analyzer
    pub fn new(
        extractor: Arc<dyn BeliefExtractor>,
        beliefs: Arc<dyn BeliefRepo>,
        graph: Arc<KnowledgeGraph>,
        similarity: Arc<SimilarityEngine>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        config: BrcaConfig,
        deadlines: DeadlineConfig,
    ) -> Self {
        Self {
            extractor,
            beliefs,
            graph,
            similarity,
            embedder,
            config,
            deadlines,
            retry: RetryPolicy::optimistic_writes(),
        }
    }

    /// Analyze a memory and persist the resulting belief updates
    pub async fn analyze(
        &self,
        memory: &MemoryRecord,
        cancel: &CancellationToken,
    ) -> Result<BeliefUpdateResult> {
        self.run(memory, cancel, true).await
    }

    /// Read-only twin of [`analyze`](Self::analyze): identical decisions,
    /// zero writes. Returned beliefs, conflicts, and edges are projections.
    pub async fn simulate(
        &self,
        memory: &MemoryRecord,
        cancel: &CancellationToken,
    ) -> Result<BeliefUpdateResult> {
        self.run(memory, cancel, false).await
    }

    async fn run(
        &self,
        memory: &MemoryRecord,
        cancel: &CancellationToken,
        persist: bool,
    ) -> Result<BeliefUpdateResult> {
        let started = Instant::now();

        let proposals = tokio::time::timeout(
            self.deadlines.extract,
            self.extractor
                .extract(&memory.content, &memory.category, &memory.agent_id),
        )
        .await
        .map_err(|_| MemoryError::Timeout("belief extraction".into()))??;

        tracing::debug!(
            agent_id = %memory.agent_id,
            memory_id = %memory.id,
            proposals = proposals.len(),
            persist,
            "extracted belief proposals"
        );

        let mut result = BeliefUpdateResult::empty();
        for proposal in &proposals {
            if cancel.is_cancelled() {
                return Err(MemoryError::Canceled("belief analysis".into()));
            }
            self.process_proposal(memory, proposal, persist, &mut result)
                .await?;
        }

        result.finalize(started);
        tracing::debug!(
            agent_id = %memory.agent_id,
            memory_id = %memory.id,
            reinforced = result.reinforced.len(),
            weakened = result.weakened.len(),
            created = result.new_beliefs.len(),
            conflicts = result.conflicts.len(),
            elapsed_ms = result.processing_time_ms,
            "belief analysis complete"
        );
        Ok(result)
    }

    async fn process_proposal(
        &self,
        memory: &MemoryRecord,
        proposal: &BeliefProposal,
        persist: bool,
        result: &mut BeliefUpdateResult,
    ) -> Result<()> {
        let matches = self.match_existing(memory, proposal).await?;

        // Partition into agreement (same polarity at the match threshold)
        // and conflict (opposite polarity at the stricter threshold)
        let agreement: Vec<&(Belief, f64)> = matches
            .iter()
            .filter(|(belief, score)| {
                belief.polarity == proposal.effective_polarity()
                    && *score >= self.config.similarity_threshold
            })
            .collect();
        let conflicts: Vec<&(Belief, f64)> = matches
            .iter()
            .filter(|(belief, score)| {
                belief.polarity != proposal.effective_polarity()
                    && *score >= self.config.conflict_threshold
            })
            .collect();

        let mut new_side = NewSide::None;

        if let Some((best, _)) = agreement.first() {
            let delta = self.config.reinforcement_alpha * proposal.confidence;
            let reinforced = self
                .mutate_belief(best, persist, |belief| {
                    belief.reinforce(delta, &memory.id);
                })
                .await?;
            result.reinforced.push(reinforced.clone());
            new_side = NewSide::Reinforced(reinforced);
        } else if conflicts.is_empty() {
            let created = self.create_belief(memory, proposal, persist).await?;
            result.new_beliefs.push(created.clone());
            new_side = NewSide::Created(created);
        }

        for (existing, _score) in &conflicts {
            self.handle_conflict(memory, proposal, existing, &mut new_side, persist, result)
                .await?;
        }

        Ok(())
    }

    /// Similarity-match the proposal statement against stored beliefs.
    ///
    /// Queries at the looser of the two thresholds so the conflict set is
    /// not starved, then hydrates the matched beliefs.
    async fn match_existing(
        &self,
        memory: &MemoryRecord,
        proposal: &BeliefProposal,
    ) -> Result<Vec<(Belief, f64)>> {
        let scope = SearchScope::agent(&memory.agent_id);
        let floor = self
            .config
            .similarity_threshold
            .min(self.config.conflict_threshold);
        let hits = self
            .similarity
            .search(
                self.beliefs.as_candidate_source(),
                Query::Text(&proposal.statement),
                &scope,
                floor,
                self.config.match_limit,
            )
            .await?;

        let ids: Vec<String> = hits.iter().map(|h| h.id.clone()).collect();
        let beliefs = self.beliefs.get_many(&ids)?;
        let score_of = |id: &str| hits.iter().find(|h| h.id == id).map(|h| h.score);

        Ok(beliefs
            .into_iter()
            .filter_map(|belief| score_of(&belief.id).map(|score| (belief, score)))
            .collect())
    }

    async fn handle_conflict(
        &self,
        memory: &MemoryRecord,
        proposal: &BeliefProposal,
        existing: &Belief,
        new_side: &mut NewSide,
        persist: bool,
        result: &mut BeliefUpdateResult,
    ) -> Result<()> {
        let severity =
            ConflictSeverity::from_confidence_delta(existing.confidence - proposal.confidence);
        let description = format!(
            "\"{}\" contradicts held belief \"{}\"",
            proposal.statement, existing.statement
        );
        let mut conflict = BeliefConflict::detect(
            existing.id.clone(),
            memory.agent_id.clone(),
            Some(memory.id.clone()),
            None,
            description.clone(),
            severity,
        )?;

        let resolution = self.config.default_resolution;
        match resolution {
            ConflictResolution::TakeNew => {
                let beta = self.config.weakening_beta;
                let delta = beta * proposal.confidence;
                let floor = self.config.deactivation_threshold;
                let weakened = self
                    .mutate_belief(existing, persist, |belief| {
                        belief.weaken(delta, floor);
                    })
                    .await?;
                result.weakened.push(weakened.clone());

                let created = self
                    .ensure_new_side(memory, proposal, new_side, persist, result)
                    .await?;
                self.emit_edge(
                    &created,
                    existing,
                    RelationshipType::Supersedes,
                    Some(&description),
                    persist,
                    result,
                )
                .await?;

                conflict.resolve(resolution, "weakened prior belief, adopted new statement", proposal.confidence);
            }
            ConflictResolution::KeepOld => {
                conflict.resolve(
                    resolution,
                    "kept existing belief, discarded conflicting proposal",
                    existing.confidence,
                );
            }
            ConflictResolution::MarkUncertain => {
                let weakened = self
                    .mutate_belief(existing, persist, |belief| {
                        belief.scale_confidence(0.8);
                    })
                    .await?;
                result.weakened.push(weakened);

                let mut discounted = proposal.clone();
                discounted.confidence *= 0.8;
                let created = self
                    .ensure_new_side(memory, &discounted, new_side, persist, result)
                    .await?;
                self.emit_edge(
                    &created,
                    existing,
                    RelationshipType::ConflictsWith,
                    None,
                    persist,
                    result,
                )
                .await?;

                conflict.resolve(resolution, "both sides held with reduced confidence", 0.5);
            }
            ConflictResolution::Merge => match &proposal.synthesis {
                Some(synthesis) => {
                    let mut merged = proposal.clone();
                    merged.statement = synthesis.clone();
                    let created = self
                        .ensure_new_side(memory, &merged, new_side, persist, result)
                        .await?;
                    self.emit_edge(
                        &created,
                        existing,
                        RelationshipType::Replaces,
                        Some(&description),
                        persist,
                        result,
                    )
                    .await?;
                    conflict.resolve(resolution, "merged into synthesized statement", proposal.confidence);
                }
                None => {
                    // No synthesis available; fall back to keeping the old belief
                    conflict.resolve(
                        ConflictResolution::KeepOld,
                        "merge unavailable without synthesis, kept existing belief",
                        existing.confidence,
                    );
                }
            },
            ConflictResolution::ArchiveOld => {
                let archived = self
                    .mutate_belief(existing, persist, |belief| {
                        belief.deactivate();
                    })
                    .await?;
                result.weakened.push(archived);
                if persist {
                    self.graph.close_outgoing_edges(&existing.id, Utc::now())?;
                }

                let created = self
                    .ensure_new_side(memory, proposal, new_side, persist, result)
                    .await?;
                self.emit_edge(
                    &created,
                    existing,
                    RelationshipType::Supersedes,
                    Some(&description),
                    persist,
                    result,
                )
                .await?;

                conflict.resolve(resolution, "archived prior belief", proposal.confidence);
            }
            ConflictResolution::RequireManualReview => {
                // No mutation, no new belief; the open conflict bubbles up
            }
        }

        if persist {
            self.beliefs.insert_conflict(&conflict)?;
        }
        result.conflicts.push(conflict);
        Ok(())
    }

    /// The belief standing in for the proposal: the reinforced match or a
    /// belief created on first need
    async fn ensure_new_side(
        &self,
        memory: &MemoryRecord,
        proposal: &BeliefProposal,
        new_side: &mut NewSide,
        persist: bool,
        result: &mut BeliefUpdateResult,
    ) -> Result<Belief> {
        if let Some(existing) = new_side.belief() {
            return Ok(existing.clone());
        }
        let created = self.create_belief(memory, proposal, persist).await?;
        result.new_beliefs.push(created.clone());
        *new_side = NewSide::Created(created.clone());
        Ok(created)
    }

    async fn create_belief(
        &self,
        memory: &MemoryRecord,
        proposal: &BeliefProposal,
        persist: bool,
    ) -> Result<Belief> {
        let mut belief = Belief::from_proposal(proposal, &memory.agent_id, &memory.id);

        if persist {
            if let Some(embedder) = &self.embedder {
                match tokio::time::timeout(self.deadlines.embed, embedder.embed(&belief.statement))
                    .await
                {
                    Ok(Ok(embedding)) => belief.embedding = Some(embedding.vector),
                    Ok(Err(err)) => {
                        tracing::warn!(error = %err, "belief stored without embedding");
                    }
                    Err(_) => {
                        tracing::warn!("belief embedding timed out, stored without embedding");
                    }
                }
            }
            self.beliefs.insert(&belief)?;
        }
        Ok(belief)
    }

    /// Apply a mutation to a belief under the optimistic version guard,
    /// retrying on conflicts per the policy. In simulation the mutation is
    /// applied to a clone and nothing is written.
    async fn mutate_belief<F>(&self, current: &Belief, persist: bool, mutate: F) -> Result<Belief>
    where
        F: Fn(&mut Belief),
    {
        if !persist {
            let mut belief = current.clone();
            mutate(&mut belief);
            return Ok(belief);
        }

        let mut attempt = 1;
        loop {
            let mut belief = self
                .beliefs
                .get(&current.id)?
                .ok_or_else(|| MemoryError::NotFound(format!("belief {}", current.id)))?;
            mutate(&mut belief);
            match self.beliefs.update(&belief) {
                Ok(stored) => return Ok(stored),
                Err(err) if self.retry.should_retry(&err, attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::debug!(
                        belief_id = %current.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "version conflict, retrying belief update"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn emit_edge(
        &self,
        source: &Belief,
        target: &Belief,
        relationship_type: RelationshipType,
        deprecation_reason: Option<&str>,
        persist: bool,
        result: &mut BeliefUpdateResult,
    ) -> Result<()> {
        if source.id == target.id {
            // The proposal resolved onto the conflicting belief itself;
            // nothing to connect
            return Ok(());
        }
        let mut edge = BeliefRelationship::new(
            source.id.clone(),
            target.id.clone(),
            source.agent_id.clone(),
            relationship_type,
            1.0,
        )?
        .with_validity(Some(Utc::now()), None)?;
        if let Some(reason) = deprecation_reason {
            edge = edge.with_deprecation_reason(reason);
        }

        if persist {
            self.graph.connect(&edge)?;
        }
        result.relationships.push(edge);
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_has_unit_confidence() {
        let mut result = BeliefUpdateResult::empty();
        result.finalize(Instant::now());
        assert!((result.overall_confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(result.total_modified(), 0);
    }

    #[test]
    fn overall_confidence_is_mean_of_modified() {
        let proposal = BeliefProposal::new(
            "Sky is blue",
            0.9,
            crate::model::CategoryLabel::fallback(),
        );
        let a = Belief::from_proposal(&proposal, "a1", "m1");
        let mut b = Belief::from_proposal(&proposal, "a1", "m1");
        b.confidence = 0.5;

        let mut result = BeliefUpdateResult::empty();
        result.new_beliefs.push(a);
        result.weakened.push(b);
        result.finalize(Instant::now());
        assert!((result.overall_confidence - 0.7).abs() < 1e-9);
        assert_eq!(result.total_modified(), 2);
    }
}
