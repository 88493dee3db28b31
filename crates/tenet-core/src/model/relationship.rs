//! Typed directed edges between beliefs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, Result};

use super::clamp_unit;

// ============================================================================
// RELATIONSHIP TYPE
// ============================================================================

/// Edge type between two beliefs of the same agent
///
/// Wire names are the SCREAMING_SNAKE serde representation. Behavior lives
/// in one place: the classification table below, not scattered getters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    // Temporal
    Supersedes,
    Updates,
    Deprecates,
    Replaces,
    // Logical
    Supports,
    Contradicts,
    Implies,
    Reinforces,
    Weakens,
    // Semantic
    RelatesTo,
    Specializes,
    Generalizes,
    Extends,
    DerivesFrom,
    // Causal
    Causes,
    CausedBy,
    Enables,
    Prevents,
    // Contextual
    DependsOn,
    Precedes,
    Follows,
    ContextFor,
    // Evidence
    EvidencedBy,
    ProvidesEvidenceFor,
    ConflictsWith,
    // Similarity
    SimilarTo,
    AnalogousTo,
    ContrastsWith,
    // Escape hatch
    Custom,
}

/// Per-type classification row
struct TypeClass {
    temporal: bool,
    deprecating: bool,
    bidirectional: bool,
    inverse: Option<RelationshipType>,
}

impl RelationshipType {
    /// Every known relationship type, in declaration order
    pub const ALL: [RelationshipType; 28] = [
        RelationshipType::Supersedes,
        RelationshipType::Updates,
        RelationshipType::Deprecates,
        RelationshipType::Replaces,
        RelationshipType::Supports,
        RelationshipType::Contradicts,
        RelationshipType::Implies,
        RelationshipType::Reinforces,
        RelationshipType::Weakens,
        RelationshipType::RelatesTo,
        RelationshipType::Specializes,
        RelationshipType::Generalizes,
        RelationshipType::Extends,
        RelationshipType::DerivesFrom,
        RelationshipType::Causes,
        RelationshipType::CausedBy,
        RelationshipType::Enables,
        RelationshipType::Prevents,
        RelationshipType::DependsOn,
        RelationshipType::Precedes,
        RelationshipType::Follows,
        RelationshipType::ContextFor,
        RelationshipType::EvidencedBy,
        RelationshipType::ProvidesEvidenceFor,
        RelationshipType::ConflictsWith,
        RelationshipType::SimilarTo,
        RelationshipType::AnalogousTo,
        RelationshipType::ContrastsWith,
    ];

    /// The deprecating edge types, in chain-traversal order
    pub const DEPRECATING: [RelationshipType; 4] = [
        RelationshipType::Supersedes,
        RelationshipType::Replaces,
        RelationshipType::Deprecates,
        RelationshipType::Updates,
    ];

    fn class(&self) -> TypeClass {
        use RelationshipType::*;
        let (temporal, deprecating, bidirectional, inverse) = match self {
            Supersedes | Updates | Deprecates | Replaces => (true, true, false, None),
            Causes => (false, false, false, Some(CausedBy)),
            CausedBy => (false, false, false, Some(Causes)),
            Specializes => (false, false, false, Some(Generalizes)),
            Generalizes => (false, false, false, Some(Specializes)),
            Precedes => (false, false, false, Some(Follows)),
            Follows => (false, false, false, Some(Precedes)),
            EvidencedBy => (false, false, false, Some(ProvidesEvidenceFor)),
            ProvidesEvidenceFor => (false, false, false, Some(EvidencedBy)),
            SimilarTo | AnalogousTo | RelatesTo => (false, false, true, None),
            _ => (false, false, false, None),
        };
        TypeClass {
            temporal,
            deprecating,
            bidirectional,
            inverse,
        }
    }

    /// Temporal edge types describe ordering or replacement over time
    pub fn is_temporal(&self) -> bool {
        self.class().temporal
    }

    /// Deprecating edges mark the target as outdated
    pub fn is_deprecating(&self) -> bool {
        self.class().deprecating
    }

    /// Bidirectional-by-nature edge types
    pub fn is_bidirectional(&self) -> bool {
        self.class().bidirectional
    }

    /// The inverse edge type, when one exists
    pub fn inverse(&self) -> Option<RelationshipType> {
        self.class().inverse
    }

    /// Stable wire name
    pub fn as_str(&self) -> &'static str {
        use RelationshipType::*;
        match self {
            Supersedes => "SUPERSEDES",
            Updates => "UPDATES",
            Deprecates => "DEPRECATES",
            Replaces => "REPLACES",
            Supports => "SUPPORTS",
            Contradicts => "CONTRADICTS",
            Implies => "IMPLIES",
            Reinforces => "REINFORCES",
            Weakens => "WEAKENS",
            RelatesTo => "RELATES_TO",
            Specializes => "SPECIALIZES",
            Generalizes => "GENERALIZES",
            Extends => "EXTENDS",
            DerivesFrom => "DERIVES_FROM",
            Causes => "CAUSES",
            CausedBy => "CAUSED_BY",
            Enables => "ENABLES",
            Prevents => "PREVENTS",
            DependsOn => "DEPENDS_ON",
            Precedes => "PRECEDES",
            Follows => "FOLLOWS",
            ContextFor => "CONTEXT_FOR",
            EvidencedBy => "EVIDENCED_BY",
            ProvidesEvidenceFor => "PROVIDES_EVIDENCE_FOR",
            ConflictsWith => "CONFLICTS_WITH",
            SimilarTo => "SIMILAR_TO",
            AnalogousTo => "ANALOGOUS_TO",
            ContrastsWith => "CONTRASTS_WITH",
            Custom => "CUSTOM",
        }
    }

    /// Parse a stable wire name
    pub fn parse_name(s: &str) -> Option<Self> {
        use RelationshipType::*;
        Some(match s {
            "SUPERSEDES" => Supersedes,
            "UPDATES" => Updates,
            "DEPRECATES" => Deprecates,
            "REPLACES" => Replaces,
            "SUPPORTS" => Supports,
            "CONTRADICTS" => Contradicts,
            "IMPLIES" => Implies,
            "REINFORCES" => Reinforces,
            "WEAKENS" => Weakens,
            "RELATES_TO" => RelatesTo,
            "SPECIALIZES" => Specializes,
            "GENERALIZES" => Generalizes,
            "EXTENDS" => Extends,
            "DERIVES_FROM" => DerivesFrom,
            "CAUSES" => Causes,
            "CAUSED_BY" => CausedBy,
            "ENABLES" => Enables,
            "PREVENTS" => Prevents,
            "DEPENDS_ON" => DependsOn,
            "PRECEDES" => Precedes,
            "FOLLOWS" => Follows,
            "CONTEXT_FOR" => ContextFor,
            "EVIDENCED_BY" => EvidencedBy,
            "PROVIDES_EVIDENCE_FOR" => ProvidesEvidenceFor,
            "CONFLICTS_WITH" => ConflictsWith,
            "SIMILAR_TO" => SimilarTo,
            "ANALOGOUS_TO" => AnalogousTo,
            "CONTRASTS_WITH" => ContrastsWith,
            "CUSTOM" => Custom,
            _ => return None,
        })
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// BELIEF RELATIONSHIP
// ============================================================================

/// A directed, typed, optionally time-bounded edge between two beliefs of
/// the same agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeliefRelationship {
    /// Unique edge id
    pub id: String,
    /// Source belief
    pub source_belief_id: String,
    /// Target belief
    pub target_belief_id: String,
    /// Owner agent (must match both endpoints)
    pub agent_id: String,
    /// Edge type
    pub relationship_type: RelationshipType,
    /// Edge strength in [0, 1]
    pub strength: f64,
    /// Free-form metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub last_updated: DateTime<Utc>,
    /// Deactivated edges stay persisted but drop out of traversals
    pub active: bool,
    /// Start of temporal validity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_from: Option<DateTime<Utc>>,
    /// End of temporal validity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_until: Option<DateTime<Utc>>,
    /// Why the target was deprecated, for deprecating edges
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecation_reason: Option<String>,
    /// Tie-break priority among parallel edges
    #[serde(default)]
    pub priority: i64,
}

impl BeliefRelationship {
    /// Create a validated edge.
    ///
    /// Rejects self-loops; the same-agent endpoint check happens where both
    /// beliefs are in hand (the graph service).
    pub fn new(
        source_belief_id: impl Into<String>,
        target_belief_id: impl Into<String>,
        agent_id: impl Into<String>,
        relationship_type: RelationshipType,
        strength: f64,
    ) -> Result<Self> {
        let source_belief_id = source_belief_id.into();
        let target_belief_id = target_belief_id.into();
        if source_belief_id == target_belief_id {
            return Err(MemoryError::InvalidInput(format!(
                "self-loop relationship on belief {source_belief_id}"
            )));
        }
        let now = Utc::now();
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_belief_id,
            target_belief_id,
            agent_id: agent_id.into(),
            relationship_type,
            strength: clamp_unit(strength),
            metadata: None,
            created_at: now,
            last_updated: now,
            active: true,
            effective_from: None,
            effective_until: None,
            deprecation_reason: None,
            priority: 0,
        })
    }

    /// Set the validity window, enforcing `from <= until` when both are set
    pub fn with_validity(
        mut self,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        if let (Some(f), Some(u)) = (from, until) {
            if f > u {
                return Err(MemoryError::InvalidInput(format!(
                    "effectiveFrom {f} is after effectiveUntil {u}"
                )));
            }
        }
        self.effective_from = from;
        self.effective_until = until;
        Ok(self)
    }

    /// Record why the target was deprecated
    pub fn with_deprecation_reason(mut self, reason: impl Into<String>) -> Self {
        self.deprecation_reason = Some(reason.into());
        self
    }

    /// Whether the edge applies at the given instant
    pub fn is_effective_at(&self, time: DateTime<Utc>) -> bool {
        let after_start = self.effective_from.is_none_or(|from| time >= from);
        let before_end = self.effective_until.is_none_or(|until| time <= until);
        self.active && after_start && before_end
    }
}

// ============================================================================
// TESTS
// ============================================================================
