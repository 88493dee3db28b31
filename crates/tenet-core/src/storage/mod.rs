//! Storage layer
//!
//! Three repositories over one SQLite database: memories, beliefs (which
//! also persist conflicts), and relationships. The traits are the seams an
//! alternative backend would implement; the SQLite implementations share a
//! [`Database`] handle with separate reader/writer connections.

pub mod migrations;
mod sqlite;

pub use sqlite::{Database, SqliteBeliefRepo, SqliteMemoryRepo, SqliteRelationshipRepo};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::embedding::Embedding;
use crate::error::Result;
use crate::model::{
    Belief, BeliefConflict, BeliefRelationship, FilterOptions, MemoryRecord,
};
use crate::search::CandidateSource;

// ============================================================================
// REPOSITORY TRAITS
// ============================================================================

/// Memory record persistence
pub trait MemoryRepo: CandidateSource {
    /// Persist a new record
    fn insert(&self, record: &MemoryRecord) -> Result<()>;

    /// Fetch by id
    fn get(&self, id: &str) -> Result<Option<MemoryRecord>>;

    /// Fetch many; missing ids are silently omitted, found rows keep the
    /// input order
    fn get_many(&self, ids: &[String]) -> Result<Vec<MemoryRecord>>;

    /// Filtered listing for one agent, newest first
    fn find_by_agent(
        &self,
        agent_id: &str,
        filter: &FilterOptions,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>>;

    /// Delete one record; returns whether it existed
    fn delete(&self, id: &str) -> Result<bool>;

    /// Delete many; returns the number actually removed
    fn delete_many(&self, ids: &[String]) -> Result<usize>;

    /// Advance `access_count` and `last_accessed`. Counts may coalesce
    /// under load; they never decrease.
    fn increment_access(&self, id: &str) -> Result<()>;

    /// Attach an embedding to an existing record
    fn set_embedding(&self, id: &str, embedding: &Embedding) -> Result<()>;

    /// Records without an embedding, oldest first
    fn find_missing_embeddings(
        &self,
        agent_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>>;

    /// Total records, optionally scoped to one agent
    fn count(&self, agent_id: Option<&str>) -> Result<i64>;

    /// Records carrying an embedding
    fn count_with_embeddings(&self, agent_id: Option<&str>) -> Result<i64>;

    /// View this repository as a strategy candidate source
    fn as_candidate_source(&self) -> &dyn CandidateSource;

    /// Cheap liveness check
    fn ping(&self) -> Result<()>;
}

/// Belief persistence, including conflicts
pub trait BeliefRepo: CandidateSource {
    /// Persist a new belief
    fn insert(&self, belief: &Belief) -> Result<()>;

    /// Persist many beliefs in one transaction, returning them in input
    /// order. Required above 20 items.
    fn insert_batch(&self, beliefs: &[Belief]) -> Result<Vec<Belief>>;

    /// Fetch by id
    fn get(&self, id: &str) -> Result<Option<Belief>>;

    /// Fetch many; missing ids omitted, input order preserved
    fn get_many(&self, ids: &[String]) -> Result<Vec<Belief>>;

    /// Guarded update: succeeds only when the stored version matches the
    /// caller's read. Returns the stored belief with its advanced version.
    /// A mismatch yields [`crate::error::MemoryError::Conflict`].
    fn update(&self, belief: &Belief) -> Result<Belief>;

    /// Listing for one agent
    fn find_by_agent(
        &self,
        agent_id: &str,
        include_inactive: bool,
        limit: usize,
    ) -> Result<Vec<Belief>>;

    /// Beliefs targeted by an active deprecating edge, pushed down to SQL
    fn find_deprecated_belief_ids(&self, agent_id: &str) -> Result<Vec<String>>;

    /// Sources of active deprecating edges into `belief_id`, pushed down
    fn find_superseding_belief_ids(&self, agent_id: &str, belief_id: &str)
        -> Result<Vec<String>>;

    /// Total beliefs, optionally scoped
    fn count(&self, agent_id: Option<&str>) -> Result<i64>;

    /// Open a conflict record
    fn insert_conflict(&self, conflict: &BeliefConflict) -> Result<()>;

    /// Update a conflict record (resolution fields)
    fn update_conflict(&self, conflict: &BeliefConflict) -> Result<()>;

    /// Fetch one conflict
    fn get_conflict(&self, id: &str) -> Result<Option<BeliefConflict>>;

    /// Conflicts for one agent, newest first
    fn find_conflicts(&self, agent_id: &str, unresolved_only: bool)
        -> Result<Vec<BeliefConflict>>;

    /// Total conflicts, optionally scoped
    fn count_conflicts(&self, agent_id: Option<&str>) -> Result<i64>;

    /// View this repository as a strategy candidate source
    fn as_candidate_source(&self) -> &dyn CandidateSource;

    /// Cheap liveness check
    fn ping(&self) -> Result<()>;
}

/// Relationship persistence
pub trait RelationshipRepo: Send + Sync {
    /// Persist a new edge
    fn insert(&self, relationship: &BeliefRelationship) -> Result<()>;

    /// Persist many edges in one transaction, input order preserved
    fn insert_batch(&self, relationships: &[BeliefRelationship])
        -> Result<Vec<BeliefRelationship>>;

    /// Fetch by id
    fn get(&self, id: &str) -> Result<Option<BeliefRelationship>>;

    /// Overwrite an edge
    fn update(&self, relationship: &BeliefRelationship) -> Result<()>;

    /// Set `active = false`; the edge stays persisted
    fn deactivate(&self, id: &str) -> Result<bool>;

    /// Edges out of a belief
    fn find_by_source(&self, belief_id: &str, active_only: bool)
        -> Result<Vec<BeliefRelationship>>;

    /// Edges into a belief
    fn find_by_target(&self, belief_id: &str, active_only: bool)
        -> Result<Vec<BeliefRelationship>>;

    /// All edges of one agent
    fn find_by_agent(&self, agent_id: &str, active_only: bool)
        -> Result<Vec<BeliefRelationship>>;

    /// Stamp `effective_until` on a belief's active outgoing edges that have
    /// no end yet; returns how many were closed
    fn close_outgoing(&self, belief_id: &str, until: DateTime<Utc>) -> Result<usize>;

    /// Total edges, optionally scoped
    fn count(&self, agent_id: Option<&str>) -> Result<i64>;

    /// Cheap liveness check
    fn ping(&self) -> Result<()>;
}

// ============================================================================
// STORE STATISTICS
// ============================================================================

/// Aggregate counts across the three repositories
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    /// Total memory records
    pub total_memories: i64,
    /// Memory records carrying an embedding
    pub memories_with_embeddings: i64,
    /// Total beliefs
    pub total_beliefs: i64,
    /// Total relationships
    pub total_relationships: i64,
    /// Total conflicts
    pub total_conflicts: i64,
    /// When the stats were computed
    pub computed_at: Option<DateTime<Utc>>,
}
