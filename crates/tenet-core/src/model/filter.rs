//! Query filters

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Filter options for memory and belief queries
///
/// Every field is optional; absent fields do not constrain the query.
/// `active_only` defaults to true so deactivated records stay out of normal
/// reads unless explicitly requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterOptions {
    /// Restrict to one agent's space
    pub agent_id: Option<String>,
    /// Primary category match
    pub category: Option<String>,
    /// Created at or after
    pub since: Option<DateTime<Utc>>,
    /// Created at or before
    pub until: Option<DateTime<Utc>>,
    /// Metadata source tag match
    pub source: Option<String>,
    /// Minimum relevance score (consumer-computed)
    pub min_relevance_score: Option<f64>,
    /// Maximum relevance score
    pub max_relevance_score: Option<f64>,
    /// All listed tags must be present
    pub tags: Option<Vec<String>>,
    /// Exclude deactivated entities (default true)
    pub active_only: bool,
    /// Minimum category confidence
    pub min_category_confidence: Option<f64>,
    /// Skip records involved in unresolved conflicts
    pub exclude_conflicted: bool,
    /// Minimum access count
    pub min_access_count: Option<i64>,
    /// Maximum record age in seconds
    pub max_age_seconds: Option<i64>,
    /// Escape hatch for store-specific predicates
    pub custom_filters: BTreeMap<String, serde_json::Value>,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            agent_id: None,
            category: None,
            since: None,
            until: None,
            source: None,
            min_relevance_score: None,
            max_relevance_score: None,
            tags: None,
            active_only: true,
            min_category_confidence: None,
            exclude_conflicted: false,
            min_access_count: None,
            max_age_seconds: None,
            custom_filters: BTreeMap::new(),
        }
    }
}

impl FilterOptions {
    /// Filter scoped to one agent, everything else default
    pub fn for_agent(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: Some(agent_id.into()),
            ..Self::default()
        }
    }

    /// Effective lower creation bound, combining `since` and `max_age_seconds`
    pub fn effective_since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let age_floor = self
            .max_age_seconds
            .map(|secs| now - chrono::Duration::seconds(secs));
        match (self.since, age_floor) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}
