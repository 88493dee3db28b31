//! Beliefs and belief proposals

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{clamp_unit, CategoryLabel};

// ============================================================================
// POLARITY
// ============================================================================

/// Stance of a statement toward its subject
///
/// Extractors that do not emit polarity default to `Positive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Asserting the statement
    #[default]
    Positive,
    /// Denying the statement
    Negative,
}

impl Polarity {
    /// The opposite polarity
    pub fn opposite(&self) -> Self {
        match self {
            Polarity::Positive => Polarity::Negative,
            Polarity::Negative => Polarity::Positive,
        }
    }
}

// ============================================================================
// BELIEF PROPOSAL
// ============================================================================

/// A candidate belief extracted from a memory, before matching against the
/// agent's existing beliefs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeliefProposal {
    /// Single declarative sentence, trimmed, at most 300 chars
    pub statement: String,
    /// Extractor confidence, clamped to [0, 1]
    pub confidence: f64,
    /// Category inherited from the source memory
    pub category: CategoryLabel,
    /// Stance; absent means positive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polarity: Option<Polarity>,
    /// Extractor-provided merged statement for MERGE resolutions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthesis: Option<String>,
}

/// Maximum proposal statement length in characters
pub const MAX_STATEMENT_CHARS: usize = 300;

impl BeliefProposal {
    /// Create a proposal, trimming and truncating the statement and
    /// clamping confidence
    pub fn new(statement: impl Into<String>, confidence: f64, category: CategoryLabel) -> Self {
        let mut statement: String = statement.into().trim().to_string();
        if statement.chars().count() > MAX_STATEMENT_CHARS {
            statement = statement.chars().take(MAX_STATEMENT_CHARS).collect();
        }
        Self {
            statement,
            confidence: clamp_unit(confidence),
            category,
            polarity: None,
            synthesis: None,
        }
    }

    /// Set the polarity
    pub fn with_polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = Some(polarity);
        self
    }

    /// Effective polarity: absent is treated as positive
    pub fn effective_polarity(&self) -> Polarity {
        self.polarity.unwrap_or_default()
    }
}

// ============================================================================
// BELIEF
// ============================================================================

/// A distilled declarative statement held by an agent
///
/// Invariants: confidence stays in [0, 1] through every mutation,
/// `last_updated` advances on any mutation, `reinforcement_count` never
/// decreases.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Belief {
    /// Unique identifier
    pub id: String,
    /// Owner of the belief space
    pub agent_id: String,
    /// Normalized declarative statement
    pub statement: String,
    /// Current confidence in [0, 1]
    pub confidence: f64,
    /// Polarity of the statement
    #[serde(default)]
    pub polarity: Polarity,
    /// Memories supporting this belief
    pub evidence_memory_ids: BTreeSet<String>,
    /// Category inherited from the evidence
    pub category: CategoryLabel,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Advances on any mutation
    pub last_updated: DateTime<Utc>,
    /// Times this belief was reinforced; monotone non-decreasing
    pub reinforcement_count: i64,
    /// Inactive beliefs stay queryable but drop out of default similarity
    pub active: bool,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Unit-norm embedding of `statement`, when available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Optimistic-concurrency token; advances on every persisted update
    pub version: i64,
}

impl Belief {
    /// Create a fresh active belief from a proposal and its evidence memory
    pub fn from_proposal(proposal: &BeliefProposal, agent_id: &str, memory_id: &str) -> Self {
        let now = Utc::now();
        let mut evidence = BTreeSet::new();
        evidence.insert(memory_id.to_string());
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            statement: proposal.statement.clone(),
            confidence: clamp_unit(proposal.confidence),
            polarity: proposal.effective_polarity(),
            evidence_memory_ids: evidence,
            category: proposal.category.clone(),
            created_at: now,
            last_updated: now,
            reinforcement_count: 0,
            active: true,
            tags: vec![],
            embedding: None,
            version: 1,
        }
    }

    /// Reinforce: raise confidence by `delta` (clamped), bump the counter,
    /// and attach the supporting memory.
    pub fn reinforce(&mut self, delta: f64, memory_id: &str) {
        self.confidence = clamp_unit(self.confidence + delta);
        self.reinforcement_count += 1;
        self.evidence_memory_ids.insert(memory_id.to_string());
        self.touch();
    }

    /// Weaken: lower confidence by `delta` (clamped); deactivate when the
    /// result drops below `deactivate_below`.
    pub fn weaken(&mut self, delta: f64, deactivate_below: f64) {
        self.confidence = clamp_unit(self.confidence - delta);
        if self.confidence < deactivate_below {
            self.active = false;
        }
        self.touch();
    }

    /// Multiply confidence by `factor` (clamped). Used by MARK_UNCERTAIN.
    pub fn scale_confidence(&mut self, factor: f64) {
        self.confidence = clamp_unit(self.confidence * factor);
        self.touch();
    }

    /// Deactivate without deleting
    pub fn deactivate(&mut self) {
        self.active = false;
        self.touch();
    }

    fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

// ============================================================================
// TESTS
// ============================================================================
