//! Data model - the value types shared across the engine
//!
//! All types are immutable in spirit: construction clamps and normalizes,
//! mutation goes through methods that preserve invariants. Wire names are
//! camelCase fields with SCREAMING_SNAKE enum variants so an external REST
//! layer can bind without translation.

mod belief;
mod conflict;
mod filter;
mod memory;
mod relationship;

pub use belief::{Belief, BeliefProposal, Polarity};
pub use conflict::{BeliefConflict, ConflictResolution, ConflictSeverity};
pub use filter::FilterOptions;
pub use memory::{CategoryLabel, MemoryInput, MemoryMetadata, MemoryRecord};
pub use relationship::{BeliefRelationship, RelationshipType};

use serde::{Deserialize, Serialize};

/// Clamp a confidence-like value into `[0, 1]`.
///
/// Out-of-range inputs are never rejected, only clamped. NaN maps to 0.
#[inline]
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// Forgetting strategy selector (wire surface for the forgetting agent;
/// policy execution lives outside this crate)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForgettingStrategyType {
    /// Remove by record age
    Age,
    /// Remove least-accessed records first
    LeastUsed,
    /// Remove by composite relevance score
    LowScore,
    /// Caller-provided policy
    Custom,
}
