//! Information ingestion
//!
//! The end-to-end pipeline: validate (fatal), categorize (degradable),
//! encode and store (fatal), belief analysis (degradable). Per-step
//! deadlines, a cancellation token observed between steps, and semaphore
//! backpressure with immediate `Overloaded` rejection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::brca::{BeliefAnalyzer, BeliefUpdateResult};
use crate::categorize::Categorizer;
use crate::config::EngineConfig;
use crate::error::{ErrorKind, MemoryError, Result};
use crate::model::{CategoryLabel, MemoryInput, MemoryRecord};
use crate::storage::{BeliefRepo, MemoryRepo, RelationshipRepo, StoreStats};
use crate::stores::MemoryStore;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// Terminal status of an ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestionStatus {
    /// Every step completed
    Success,
    /// The memory is durable but a degradable step fell back or failed
    Partial,
    /// Nothing was persisted (surfaced through the error path; present for
    /// wire completeness)
    Error,
}

/// Outcome of one ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionResult {
    /// Id of the stored memory (`dry-run-<uuid>` for simulations)
    pub memory_id: String,
    /// Owner agent
    pub agent_id: String,
    /// Category assigned during the pipeline
    pub category: CategoryLabel,
    /// Wall-clock duration
    pub processing_time_ms: i64,
    /// Belief analysis outcome, when it ran to completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub belief_update_result: Option<BeliefUpdateResult>,
    /// Why belief analysis degraded, when it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub belief_analysis_error: Option<String>,
    /// True when any degradable step fell back
    pub partial: bool,
    /// True for `dry_run_ingest` results
    pub dry_run: bool,
    /// Terminal status
    pub status: IngestionStatus,
}

/// Ingestion counters plus store totals
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    /// Requests admitted past backpressure
    pub received: u64,
    /// Fully successful ingestions
    pub succeeded: u64,
    /// Partial ingestions (memory durable, degraded elsewhere)
    pub partial: u64,
    /// Failed ingestions (nothing persisted)
    pub failed: u64,
    /// Requests rejected by backpressure
    pub rejected_overloaded: u64,
    /// Dry runs served
    pub dry_runs: u64,
    /// Store totals
    pub store: StoreStats,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    succeeded: AtomicU64,
    partial: AtomicU64,
    failed: AtomicU64,
    rejected_overloaded: AtomicU64,
    dry_runs: AtomicU64,
}

// ============================================================================
// INGESTION MODULE
// ============================================================================

/// The information ingestion module (C9)
pub struct IngestionModule {
    config: EngineConfig,
    categorizer: Arc<dyn Categorizer>,
    memories: Arc<MemoryStore>,
    analyzer: Arc<BeliefAnalyzer>,
    belief_repo: Arc<dyn BeliefRepo>,
    relationship_repo: Arc<dyn RelationshipRepo>,
    inflight: Arc<Semaphore>,
    counters: Counters,
}

impl IngestionModule {
    /// Wire up the module
    pub fn new(
        config: EngineConfig,
        categorizer: Arc<dyn Categorizer>,
        memories: Arc<MemoryStore>,
        analyzer: Arc<BeliefAnalyzer>,
        belief_repo: Arc<dyn BeliefRepo>,
        relationship_repo: Arc<dyn RelationshipRepo>,
    ) -> Self {
        let inflight = Arc::new(Semaphore::new(config.ingestion.max_inflight));
        Self {
            config,
            categorizer,
            memories,
            analyzer,
            belief_repo,
            relationship_repo,
            inflight,
            counters: Counters::default(),
        }
    }

    /// Validate an ingestion request. Pure and repeatable: the same input
    /// always yields the same verdict.
    pub fn validate_input(&self, input: &MemoryInput) -> Result<()> {
        let limits = &self.config.ingestion;

        if input.agent_id.trim().is_empty() {
            return Err(MemoryError::InvalidInput("agentId must not be blank".into()));
        }
        if input.agent_id.chars().count() > limits.max_agent_id_chars {
            return Err(MemoryError::InvalidInput(format!(
                "agentId exceeds {} characters",
                limits.max_agent_id_chars
            )));
        }
        if input.content.trim().is_empty() {
            return Err(MemoryError::InvalidInput("content must not be blank".into()));
        }
        if input.content.chars().count() > limits.max_content_chars {
            return Err(MemoryError::InvalidInput(format!(
                "content exceeds {} characters",
                limits.max_content_chars
            )));
        }
        Ok(())
    }

    /// Run the full pipeline with a fresh cancellation token
    pub async fn ingest(&self, input: MemoryInput) -> Result<IngestionResult> {
        self.ingest_with_cancel(input, &CancellationToken::new()).await
    }

    /// Run the full pipeline, observing `cancel` between steps.
    ///
    /// Cancellation before the memory write persists nothing; after the
    /// write, belief analysis is skipped and the result is PARTIAL.
    pub async fn ingest_with_cancel(
        &self,
        input: MemoryInput,
        cancel: &CancellationToken,
    ) -> Result<IngestionResult> {
        let started = Instant::now();

        let _permit = self.inflight.try_acquire().map_err(|_| {
            self.counters.rejected_overloaded.fetch_add(1, Ordering::Relaxed);
            MemoryError::Overloaded(format!(
                "ingestion queue at capacity ({})",
                self.config.ingestion.max_inflight
            ))
        })?;
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        let outcome = self.pipeline(&input, cancel, started).await;
        match &outcome {
            Ok(result) if result.partial => {
                self.counters.partial.fetch_add(1, Ordering::Relaxed);
            }
            Ok(_) => {
                self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    agent_id = %input.agent_id,
                    kind = %err.kind(),
                    error = %err,
                    "ingestion failed"
                );
            }
        }
        outcome
    }

    async fn pipeline(
        &self,
        input: &MemoryInput,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<IngestionResult> {
        // Step 1: validation, fatal
        self.validate_input(input)?;
        if cancel.is_cancelled() {
            return Err(MemoryError::Canceled("before memory write".into()));
        }

        // Step 2: categorization, degradable to the fallback label
        let (category, mut partial) = self.categorize_step(&input.content).await;

        // Step 3: encode and store, fatal
        if cancel.is_cancelled() {
            return Err(MemoryError::Canceled("before memory write".into()));
        }
        let record = self.memories.encode_and_store(input, category.clone()).await?;
        if record.embedding.is_none() && self.config.embedding.enabled {
            partial = true;
        }

        // Step 4: belief analysis, degradable; the memory stays durable
        let (belief_update_result, belief_analysis_error) =
            self.analysis_step(&record, cancel).await;
        if belief_analysis_error.is_some() {
            partial = true;
        }

        let status = if partial {
            IngestionStatus::Partial
        } else {
            IngestionStatus::Success
        };
        tracing::debug!(
            agent_id = %record.agent_id,
            memory_id = %record.id,
            ?status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "ingestion complete"
        );

        Ok(IngestionResult {
            memory_id: record.id,
            agent_id: record.agent_id,
            category,
            processing_time_ms: started.elapsed().as_millis() as i64,
            belief_update_result,
            belief_analysis_error,
            partial,
            dry_run: false,
            status,
        })
    }

    async fn categorize_step(&self, content: &str) -> (CategoryLabel, bool) {
        match tokio::time::timeout(
            self.config.deadlines.categorize,
            self.categorizer.categorize(content, None),
        )
        .await
        {
            Ok(Ok(label)) => (label, false),
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "categorization failed, using fallback label");
                (CategoryLabel::fallback(), true)
            }
            Err(_) => {
                tracing::warn!("categorization timed out, using fallback label");
                (CategoryLabel::fallback(), true)
            }
        }
    }

    async fn analysis_step(
        &self,
        record: &MemoryRecord,
        cancel: &CancellationToken,
    ) -> (Option<BeliefUpdateResult>, Option<String>) {
        if cancel.is_cancelled() {
            return (None, Some("canceled".into()));
        }

        match tokio::time::timeout(
            self.config.deadlines.brca,
            self.analyzer.analyze(record, cancel),
        )
        .await
        {
            Ok(Ok(result)) => (Some(result), None),
            Ok(Err(err)) => {
                tracing::warn!(
                    memory_id = %record.id,
                    kind = %err.kind(),
                    error = %err,
                    "belief analysis degraded"
                );
                (None, Some(Self::analysis_error_tag(&err)))
            }
            Err(_) => {
                tracing::warn!(memory_id = %record.id, "belief analysis timed out");
                (None, Some("timeout".into()))
            }
        }
    }

    /// Stable short tags for the well-known degradations; everything else
    /// keeps its message
    fn analysis_error_tag(err: &MemoryError) -> String {
        match err.kind() {
            ErrorKind::Timeout => "timeout".into(),
            ErrorKind::Conflict => "contention".into(),
            ErrorKind::Canceled => "canceled".into(),
            _ => err.to_string(),
        }
    }

    /// Simulate an ingestion: validation and categorization run for real,
    /// belief analysis runs read-only, and nothing is written. The returned
    /// `memory_id` is a `dry-run-` placeholder that no store will resolve.
    pub async fn dry_run_ingest(&self, input: MemoryInput) -> Result<IngestionResult> {
        let started = Instant::now();
        self.counters.dry_runs.fetch_add(1, Ordering::Relaxed);

        self.validate_input(&input)?;
        let (category, mut partial) = self.categorize_step(&input.content).await;

        let mut record = MemoryRecord::encode(&input, category.clone());
        record.id = format!("dry-run-{}", uuid::Uuid::new_v4());

        let cancel = CancellationToken::new();
        let (belief_update_result, belief_analysis_error) = match tokio::time::timeout(
            self.config.deadlines.brca,
            self.analyzer.simulate(&record, &cancel),
        )
        .await
        {
            Ok(Ok(result)) => (Some(result), None),
            Ok(Err(err)) => (None, Some(Self::analysis_error_tag(&err))),
            Err(_) => (None, Some("timeout".into())),
        };
        if belief_analysis_error.is_some() {
            partial = true;
        }

        Ok(IngestionResult {
            memory_id: record.id,
            agent_id: record.agent_id,
            category,
            processing_time_ms: started.elapsed().as_millis() as i64,
            belief_update_result,
            belief_analysis_error,
            partial,
            dry_run: true,
            status: if partial {
                IngestionStatus::Partial
            } else {
                IngestionStatus::Success
            },
        })
    }

    /// Ingestion counters plus store totals
    pub fn statistics(&self) -> Result<EngineStats> {
        let memory_repo = self.memories.repo();
        Ok(EngineStats {
            received: self.counters.received.load(Ordering::Relaxed),
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            partial: self.counters.partial.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            rejected_overloaded: self.counters.rejected_overloaded.load(Ordering::Relaxed),
            dry_runs: self.counters.dry_runs.load(Ordering::Relaxed),
            store: StoreStats {
                total_memories: memory_repo.count(None)?,
                memories_with_embeddings: memory_repo.count_with_embeddings(None)?,
                total_beliefs: self.belief_repo.count(None)?,
                total_relationships: self.relationship_repo.count(None)?,
                total_conflicts: self.belief_repo.count_conflicts(None)?,
                computed_at: Some(Utc::now()),
            },
        })
    }

    /// Whether all three repositories answer a liveness probe
    pub fn is_healthy(&self) -> bool {
        let memories = self.memories.repo().ping();
        let beliefs = self.belief_repo.ping();
        let relationships = self.relationship_repo.ping();
        if let Err(err) = &memories {
            tracing::warn!(error = %err, "memory repo unhealthy");
        }
        if let Err(err) = &beliefs {
            tracing::warn!(error = %err, "belief repo unhealthy");
        }
        if let Err(err) = &relationships {
            tracing::warn!(error = %err, "relationship repo unhealthy");
        }
        memories.is_ok() && beliefs.is_ok() && relationships.is_ok()
    }
}

