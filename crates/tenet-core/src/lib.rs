//! # Tenet Core
//!
//! Per-agent long-term memory engine for AI systems:
//!
//! - **Ingestion pipeline**: validate, categorize, encode and store, then
//!   distill into beliefs — one request, explicit partial-failure semantics
//! - **Belief graph**: typed directed edges with temporal validity,
//!   deprecation chains, cluster queries
//! - **Reinforcement & conflict analysis**: repeated evidence strengthens
//!   beliefs, contradictions weaken, supersede, or escalate to review
//! - **Similarity strategies**: storage-native vector index, exact cosine,
//!   and a self-contained keyword/Jaccard fallback with one contract
//!
//! Every memory and belief is scoped to an `agentId`; agents' spaces are
//! fully independent.
//!
//! ## Quick Start
//!
//! ```rust
//! use tenet_core::{EngineConfig, MemoryEngine, MemoryInput};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> tenet_core::Result<()> {
//! let engine = MemoryEngine::builder(EngineConfig::default()).build()?;
//!
//! let result = engine
//!     .ingest(MemoryInput::new("agent-1", "The sky is blue."))
//!     .await?;
//! assert!(!result.memory_id.is_empty());
//!
//! let beliefs = engine.beliefs().find_by_agent("agent-1", false, 10)?;
//! # let _ = beliefs;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `bundled-sqlite` (default): compile SQLite into the binary
//! - `embeddings`: real local embedding model via fastembed; without it the
//!   deterministic hash embedder is the fallback provider
//! - `vector-search`: USearch HNSW index backing the storage-native
//!   similarity strategy
//! - `full`: both of the above

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod brca;
pub mod categorize;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod extract;
pub mod graph;
pub mod ingest;
pub mod model;
pub mod retry;
pub mod search;
pub mod storage;
pub mod stores;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Model types
pub use model::{
    clamp_unit, Belief, BeliefConflict, BeliefProposal, BeliefRelationship, CategoryLabel,
    ConflictResolution, ConflictSeverity, FilterOptions, ForgettingStrategyType, MemoryInput,
    MemoryMetadata, MemoryRecord, Polarity, RelationshipType,
};

// Errors
pub use error::{ErrorKind, MemoryError, Result};

// Configuration
pub use config::{
    BrcaConfig, DeadlineConfig, EmbeddingConfig, EngineConfig, IngestionConfig, SimilarityConfig,
    StrategyKind,
};

// Engine assembly
pub use engine::{EngineBuilder, MemoryEngine};

// Embeddings
pub use embedding::{
    cosine_similarity, dot_product, DeterministicEmbedder, Embedding, EmbeddingProvider,
    QueryEmbeddingCache,
};

#[cfg(feature = "embeddings")]
#[cfg_attr(docsrs, doc(cfg(feature = "embeddings")))]
pub use embedding::FastembedProvider;

// Search strategies
pub use search::{
    extract_keywords, jaccard_similarity, CandidateSource, ExactCosineStrategy, KeywordCandidate,
    KeywordStrategy, Query, ScoredId, SearchScope, SimilarityEngine, VectorCandidate,
};

#[cfg(feature = "vector-search")]
#[cfg_attr(docsrs, doc(cfg(feature = "vector-search")))]
pub use search::{NativeVectorIndex, NativeVectorStrategy};

// Storage
pub use storage::{
    BeliefRepo, Database, MemoryRepo, RelationshipRepo, SqliteBeliefRepo, SqliteMemoryRepo,
    SqliteRelationshipRepo, StoreStats,
};

// Store facades
pub use stores::{BeliefStore, EmbeddingBackfill, MemoryStore};

// Plug-ins
pub use categorize::{Categorizer, CategoryHints, PatternCategorizer};
pub use extract::{BeliefExtractor, PatternExtractor};

// Belief analysis
pub use brca::{BeliefAnalyzer, BeliefUpdateResult};

// Knowledge graph
pub use graph::{GraphValidation, KnowledgeGraph};

// Ingestion
pub use ingest::{EngineStats, IngestionModule, IngestionResult, IngestionStatus};

// Retry policy
pub use retry::RetryPolicy;

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        Belief, BeliefConflict, BeliefRelationship, BeliefUpdateResult, CategoryLabel,
        ConflictResolution, EngineConfig, ErrorKind, FilterOptions, IngestionResult,
        IngestionStatus, MemoryEngine, MemoryError, MemoryInput, MemoryRecord, Polarity,
        RelationshipType, Result,
    };

    pub use crate::{BeliefAnalyzer, IngestionModule, KnowledgeGraph};

    pub use crate::{BeliefExtractor, Categorizer, EmbeddingProvider};
}
