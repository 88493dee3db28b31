//! Memory records and categorization labels

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::clamp_unit;

// ============================================================================
// CATEGORY LABEL
// ============================================================================

/// Category assigned to a memory by the categorization engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryLabel {
    /// Primary category (always present)
    pub primary: String,
    /// Optional sub-category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
    /// Free-form tags, trimmed and non-empty
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Engine self-assessment, clamped to [0, 1]
    pub confidence: f64,
}

impl CategoryLabel {
    /// Create a label, clamping confidence and dropping blank tags
    pub fn new(primary: impl Into<String>, confidence: f64) -> Self {
        Self {
            primary: primary.into(),
            secondary: None,
            tags: BTreeSet::new(),
            confidence: clamp_unit(confidence),
        }
    }

    /// Set the secondary category
    pub fn with_secondary(mut self, secondary: impl Into<String>) -> Self {
        self.secondary = Some(secondary.into());
        self
    }

    /// Add tags, trimming whitespace and skipping empties
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tag in tags {
            let trimmed = tag.as_ref().trim();
            if !trimmed.is_empty() {
                self.tags.insert(trimmed.to_string());
            }
        }
        self
    }

    /// The label returned when categorization fails entirely
    pub fn fallback() -> Self {
        CategoryLabel::new("general", 0.5).with_secondary("information")
    }
}

// ============================================================================
// MEMORY METADATA
// ============================================================================

/// Free-form metadata carried by a memory record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryMetadata {
    /// Caller-assigned importance (0-1 by convention, not enforced)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
    /// Tags attached at ingestion
    pub tags: Vec<String>,
    /// Origin tag (conversation id, URL, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Caller confidence in the content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Number of times the record was read; coalescing under load is
    /// permitted, the count only ever grows
    pub access_count: i64,
    /// Last read timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<DateTime<Utc>>,
    /// Anything else, passed through untouched
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

// ============================================================================
// MEMORY INPUT
// ============================================================================

/// Ingestion request
///
/// Uses `deny_unknown_fields` to prevent field injection from untrusted
/// callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MemoryInput {
    /// Owner of the memory space
    pub agent_id: String,
    /// The natural-language memory text
    pub content: String,
    /// Free-form origin tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Event time; defaults to ingestion time when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Caller-supplied metadata
    #[serde(default)]
    pub metadata: MemoryMetadata,
}

impl MemoryInput {
    /// Minimal input for the given agent and content
    pub fn new(agent_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            content: content.into(),
            source: None,
            timestamp: None,
            metadata: MemoryMetadata::default(),
        }
    }
}

// ============================================================================
// MEMORY RECORD
// ============================================================================

/// A persisted memory
///
/// `id` and `agent_id` are immutable once written; `version` advances on
/// every update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    /// Unique identifier, assigned at encode time
    pub id: String,
    /// Owner of the memory space
    pub agent_id: String,
    /// The memorized text
    pub content: String,
    /// Category assigned at ingestion
    pub category: CategoryLabel,
    /// Metadata, including access tracking
    pub metadata: MemoryMetadata,
    /// Unit-norm embedding of `content`; either a full vector of the
    /// configured dimension or absent, never partial
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// When the record was encoded
    pub created_at: DateTime<Utc>,
    /// When the record was last modified
    pub last_updated: DateTime<Utc>,
    /// Monotonic update counter
    pub version: i64,
}

impl MemoryRecord {
    /// Build a fresh record for the given input and category.
    ///
    /// The id is a new UUID v4; timestamps are set to now.
    pub fn encode(input: &MemoryInput, category: CategoryLabel) -> Self {
        let now = Utc::now();
        let mut metadata = input.metadata.clone();
        // Out-of-range caller confidences are clamped, never rejected
        metadata.confidence = metadata.confidence.map(clamp_unit);
        metadata.importance = metadata.importance.map(clamp_unit);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: input.agent_id.clone(),
            content: input.content.clone(),
            category,
            metadata,
            embedding: None,
            created_at: input.timestamp.unwrap_or(now),
            last_updated: now,
            version: 1,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
