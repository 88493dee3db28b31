//! Belief conflicts and resolution strategies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, Result};

use super::clamp_unit;

// ============================================================================
// RESOLUTION STRATEGIES
// ============================================================================

/// How a detected conflict is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictResolution {
    /// Weaken the old belief, create the new one, emit SUPERSEDES
    TakeNew,
    /// Keep the old belief untouched, discard the proposal
    KeepOld,
    /// Scale both confidences down and keep both beliefs
    MarkUncertain,
    /// Leave everything untouched; a human decides later
    RequireManualReview,
    /// Replace the old belief with an extractor-synthesized statement
    Merge,
    /// Deactivate the old belief and close out its edges
    ArchiveOld,
}

impl ConflictResolution {
    /// Stable wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictResolution::TakeNew => "TAKE_NEW",
            ConflictResolution::KeepOld => "KEEP_OLD",
            ConflictResolution::MarkUncertain => "MARK_UNCERTAIN",
            ConflictResolution::RequireManualReview => "REQUIRE_MANUAL_REVIEW",
            ConflictResolution::Merge => "MERGE",
            ConflictResolution::ArchiveOld => "ARCHIVE_OLD",
        }
    }

    /// Parse a stable wire name
    pub fn parse_name(s: &str) -> Option<Self> {
        Some(match s {
            "TAKE_NEW" => ConflictResolution::TakeNew,
            "KEEP_OLD" => ConflictResolution::KeepOld,
            "MARK_UNCERTAIN" => ConflictResolution::MarkUncertain,
            "REQUIRE_MANUAL_REVIEW" => ConflictResolution::RequireManualReview,
            "MERGE" => ConflictResolution::Merge,
            "ARCHIVE_OLD" => ConflictResolution::ArchiveOld,
            _ => return None,
        })
    }
}

impl std::fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// SEVERITY
// ============================================================================

/// Conflict severity, derived from the confidence gap between the sides
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ConflictSeverity {
    /// Severity from the absolute confidence delta between the conflicting
    /// sides: < 0.2 low, < 0.5 medium, otherwise high.
    pub fn from_confidence_delta(delta: f64) -> Self {
        let delta = delta.abs();
        if delta < 0.2 {
            ConflictSeverity::Low
        } else if delta < 0.5 {
            ConflictSeverity::Medium
        } else {
            ConflictSeverity::High
        }
    }

    /// Stable wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictSeverity::Low => "LOW",
            ConflictSeverity::Medium => "MEDIUM",
            ConflictSeverity::High => "HIGH",
            ConflictSeverity::Critical => "CRITICAL",
        }
    }

    /// Parse a stable wire name
    pub fn parse_name(s: &str) -> Option<Self> {
        Some(match s {
            "LOW" => ConflictSeverity::Low,
            "MEDIUM" => ConflictSeverity::Medium,
            "HIGH" => ConflictSeverity::High,
            "CRITICAL" => ConflictSeverity::Critical,
            _ => return None,
        })
    }
}

// ============================================================================
// BELIEF CONFLICT
// ============================================================================

/// A detected contradiction between a belief and either a memory or another
/// belief
///
/// Invariant: `resolved` is true exactly when `resolved_at` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeliefConflict {
    /// Unique id
    pub id: String,
    /// The established belief under challenge
    pub belief_id: String,
    /// The memory that triggered the conflict, when the other side is raw text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_id: Option<String>,
    /// The other belief, when belief contradicts belief
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflicting_belief_id: Option<String>,
    /// Owner agent
    pub agent_id: String,
    /// Human-readable description of the contradiction
    pub description: String,
    /// Strategy applied, once resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ConflictResolution>,
    /// Free-form notes from the resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_details: Option<String>,
    /// Confidence in the resolution, clamped to [0, 1]
    pub resolution_confidence: f64,
    /// When the conflict was detected
    pub detected_at: DateTime<Utc>,
    /// When the conflict was resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Mirror of `resolved_at.is_some()`
    pub resolved: bool,
    /// Severity bucket
    pub severity: ConflictSeverity,
}

impl BeliefConflict {
    /// Open a new unresolved conflict. At least one of `memory_id` and
    /// `conflicting_belief_id` must be present.
    pub fn detect(
        belief_id: impl Into<String>,
        agent_id: impl Into<String>,
        memory_id: Option<String>,
        conflicting_belief_id: Option<String>,
        description: impl Into<String>,
        severity: ConflictSeverity,
    ) -> Result<Self> {
        if memory_id.is_none() && conflicting_belief_id.is_none() {
            return Err(MemoryError::InvalidInput(
                "conflict needs a memoryId or a conflictingBeliefId".into(),
            ));
        }
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            belief_id: belief_id.into(),
            memory_id,
            conflicting_belief_id,
            agent_id: agent_id.into(),
            description: description.into(),
            resolution: None,
            resolution_details: None,
            resolution_confidence: 0.0,
            detected_at: Utc::now(),
            resolved_at: None,
            resolved: false,
            severity,
        })
    }

    /// Mark the conflict resolved with the given strategy and notes
    pub fn resolve(
        &mut self,
        resolution: ConflictResolution,
        details: impl Into<String>,
        confidence: f64,
    ) {
        self.resolution = Some(resolution);
        self.resolution_details = Some(details.into());
        self.resolution_confidence = clamp_unit(confidence);
        self.resolved_at = Some(Utc::now());
        self.resolved = true;
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_buckets() {
        assert_eq!(ConflictSeverity::from_confidence_delta(0.1), ConflictSeverity::Low);
        assert_eq!(ConflictSeverity::from_confidence_delta(-0.1), ConflictSeverity::Low);
        assert_eq!(ConflictSeverity::from_confidence_delta(0.3), ConflictSeverity::Medium);
        assert_eq!(ConflictSeverity::from_confidence_delta(0.7), ConflictSeverity::High);
    }

    #[test]
    fn conflict_needs_one_side() {
        let result = BeliefConflict::detect("b1", "a1", None, None, "d", ConflictSeverity::Low);
        assert!(result.is_err());
    }

    #[test]
    fn resolved_mirrors_resolved_at() {
        let mut conflict = BeliefConflict::detect(
            "b1",
            "a1",
            Some("m1".into()),
            None,
            "sky color dispute",
            ConflictSeverity::Medium,
        )
        .unwrap();
        assert!(!conflict.resolved);
        assert!(conflict.resolved_at.is_none());

        conflict.resolve(ConflictResolution::TakeNew, "newer evidence wins", 0.9);
        assert!(conflict.resolved);
        assert!(conflict.resolved_at.is_some());
        assert_eq!(conflict.resolution, Some(ConflictResolution::TakeNew));
    }

    #[test]
    fn resolution_wire_names() {
        for r in [
            ConflictResolution::TakeNew,
            ConflictResolution::KeepOld,
            ConflictResolution::MarkUncertain,
            ConflictResolution::RequireManualReview,
            ConflictResolution::Merge,
            ConflictResolution::ArchiveOld,
        ] {
            assert_eq!(ConflictResolution::parse_name(r.as_str()), Some(r));
            let json = serde_json::to_string(&r).unwrap();
            assert_eq!(json, format!("\"{}\"", r.as_str()));
        }
    }
}
