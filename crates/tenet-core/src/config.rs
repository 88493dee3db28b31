//! Engine configuration
//!
//! A plain configuration struct assembled by the embedding application.
//! Loading (files, env, profiles) is the caller's concern; everything here
//! is serde-deserializable so an external loader can bind directly.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which similarity strategy the engine should run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Probe capabilities at startup, prefer native, then vector, then text
    #[default]
    Auto,
    /// Keyword/Jaccard matching only, no embedding calls
    Text,
    /// Exact cosine over loaded embeddings
    Vector,
    /// Storage-native vector index
    Native,
}

/// Similarity search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimilarityConfig {
    /// Strategy selection
    pub strategy: StrategyKind,
    /// Minimum score for a result to be returned
    pub threshold: f64,
    /// Hard cap on result set size
    pub max_results: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Auto,
            threshold: 0.0,
            max_results: 1000,
        }
    }
}

/// Belief reinforcement and conflict analysis tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrcaConfig {
    /// Confidence gained per reinforcement, scaled by proposal confidence
    pub reinforcement_alpha: f64,
    /// Confidence lost when a belief is weakened by a conflicting proposal
    pub weakening_beta: f64,
    /// Beliefs dropping below this confidence are deactivated
    pub deactivation_threshold: f64,
    /// Minimum similarity for a proposal to match an existing belief
    pub similarity_threshold: f64,
    /// Minimum similarity for an opposite-polarity match to count as a conflict
    pub conflict_threshold: f64,
    /// Resolution applied when a conflict is detected
    pub default_resolution: crate::model::ConflictResolution,
    /// Candidate cap per proposal match query
    pub match_limit: usize,
}

impl Default for BrcaConfig {
    fn default() -> Self {
        Self {
            reinforcement_alpha: 0.15,
            weakening_beta: 0.3,
            deactivation_threshold: 0.2,
            similarity_threshold: 0.75,
            conflict_threshold: 0.80,
            default_resolution: crate::model::ConflictResolution::MarkUncertain,
            match_limit: 10,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingConfig {
    /// Whether records get embeddings at all
    pub enabled: bool,
    /// Process-wide vector dimension
    pub dimension: usize,
    /// Capacity of the query-embedding LRU cache
    pub query_cache_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dimension: 1536,
            query_cache_size: 100,
        }
    }
}

/// Ingestion limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IngestionConfig {
    /// Maximum memory content length in characters
    pub max_content_chars: usize,
    /// Maximum agent id length in characters
    pub max_agent_id_chars: usize,
    /// Concurrent ingestions admitted before `Overloaded` rejections
    pub max_inflight: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_content_chars: 10_000,
            max_agent_id_chars: 100,
            max_inflight: 256,
        }
    }
}

/// Per-operation deadlines for suspending calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeadlineConfig {
    /// Embedding generation
    #[serde(with = "duration_millis")]
    pub embed: Duration,
    /// Categorization
    #[serde(with = "duration_millis")]
    pub categorize: Duration,
    /// Belief extraction
    #[serde(with = "duration_millis")]
    pub extract: Duration,
    /// A single store operation
    #[serde(with = "duration_millis")]
    pub store: Duration,
    /// The whole belief analysis step
    #[serde(with = "duration_millis")]
    pub brca: Duration,
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            embed: Duration::from_secs(10),
            categorize: Duration::from_secs(30),
            extract: Duration::from_secs(30),
            store: Duration::from_secs(10),
            brca: Duration::from_secs(60),
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Similarity search
    pub similarity: SimilarityConfig,
    /// Belief analysis
    pub brca: BrcaConfig,
    /// Embeddings
    pub embedding: EmbeddingConfig,
    /// Ingestion limits
    pub ingestion: IngestionConfig,
    /// Per-operation deadlines
    pub deadlines: DeadlineConfig,
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
