//! Engine assembly
//!
//! Explicit constructor wiring: the builder takes the configuration struct
//! and the plug-ins, assembles repositories, stores, analyzer, graph, and
//! the ingestion module, and hands back one engine value. No ambient
//! lifecycles, no service locator.

use std::path::Path;
use std::sync::Arc;

use crate::brca::BeliefAnalyzer;
use crate::categorize::{Categorizer, PatternCategorizer};
use crate::config::EngineConfig;
use crate::embedding::{DeterministicEmbedder, EmbeddingProvider, QueryEmbeddingCache};
use crate::error::Result;
use crate::extract::{BeliefExtractor, PatternExtractor};
use crate::graph::KnowledgeGraph;
use crate::ingest::{EngineStats, IngestionModule, IngestionResult};
use crate::model::MemoryInput;
use crate::search::SimilarityEngine;
use crate::storage::{
    BeliefRepo, Database, MemoryRepo, RelationshipRepo, SqliteBeliefRepo, SqliteMemoryRepo,
    SqliteRelationshipRepo,
};
use crate::stores::{BeliefStore, MemoryStore};

/// Builder for [`MemoryEngine`]
pub struct EngineBuilder {
    config: EngineConfig,
    database: Option<Arc<Database>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    categorizer: Option<Arc<dyn Categorizer>>,
    extractor: Option<Arc<dyn BeliefExtractor>>,
}

impl EngineBuilder {
    /// Start from a configuration
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            database: None,
            embedder: None,
            categorizer: None,
            extractor: None,
        }
    }

    /// Use a database file at `path`
    pub fn with_database_path(mut self, path: &Path) -> Result<Self> {
        self.database = Some(Database::open(path)?);
        Ok(self)
    }

    /// Use an already opened database handle
    pub fn with_database(mut self, database: Arc<Database>) -> Self {
        self.database = Some(database);
        self
    }

    /// Replace the embedding provider (default: the deterministic hash
    /// embedder at the configured dimension)
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Replace the categorization engine (default: the pattern matcher)
    pub fn with_categorizer(mut self, categorizer: Arc<dyn Categorizer>) -> Self {
        self.categorizer = Some(categorizer);
        self
    }

    /// Replace the belief extractor (default: the pattern extractor)
    pub fn with_extractor(mut self, extractor: Arc<dyn BeliefExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Assemble the engine
    pub fn build(self) -> Result<MemoryEngine> {
        let config = self.config;

        let database = match self.database {
            Some(database) => database,
            None => Database::open_in_memory()?,
        };

        let embedder: Option<Arc<dyn EmbeddingProvider>> = if config.embedding.enabled {
            Some(self.embedder.unwrap_or_else(|| {
                Arc::new(DeterministicEmbedder::new(config.embedding.dimension))
            }))
        } else {
            None
        };
        let dimensions = embedder
            .as_ref()
            .map(|e| e.dimensions())
            .unwrap_or(config.embedding.dimension);

        let categorizer: Arc<dyn Categorizer> =
            self.categorizer.unwrap_or_else(|| Arc::new(PatternCategorizer));
        let extractor: Arc<dyn BeliefExtractor> =
            self.extractor.unwrap_or_else(|| Arc::new(PatternExtractor));

        let memory_repo: Arc<dyn MemoryRepo> =
            Arc::new(SqliteMemoryRepo::new(database.clone(), dimensions)?);
        let belief_repo: Arc<dyn BeliefRepo> =
            Arc::new(SqliteBeliefRepo::new(database.clone(), dimensions)?);
        let relationship_repo: Arc<dyn RelationshipRepo> =
            Arc::new(SqliteRelationshipRepo::new(database.clone()));

        let query_cache = embedder.as_ref().map(|provider| {
            Arc::new(QueryEmbeddingCache::new(
                provider.clone(),
                config.embedding.query_cache_size,
            ))
        });
        let similarity = Arc::new(SimilarityEngine::new(config.similarity.clone(), query_cache));

        let graph = Arc::new(KnowledgeGraph::new(
            belief_repo.clone(),
            relationship_repo.clone(),
        ));
        let analyzer = Arc::new(BeliefAnalyzer::new(
            extractor,
            belief_repo.clone(),
            graph.clone(),
            similarity.clone(),
            embedder.clone(),
            config.brca.clone(),
            config.deadlines.clone(),
        ));

        let memories = Arc::new(MemoryStore::new(
            memory_repo,
            embedder,
            similarity.clone(),
            config.deadlines.embed,
        ));
        let beliefs = Arc::new(BeliefStore::new(belief_repo.clone(), similarity));

        let ingestion = Arc::new(IngestionModule::new(
            config.clone(),
            categorizer,
            memories.clone(),
            analyzer.clone(),
            belief_repo,
            relationship_repo,
        ));

        Ok(MemoryEngine {
            config,
            memories,
            beliefs,
            graph,
            ingestion,
        })
    }
}

/// The assembled per-agent memory engine
pub struct MemoryEngine {
    config: EngineConfig,
    memories: Arc<MemoryStore>,
    beliefs: Arc<BeliefStore>,
    graph: Arc<KnowledgeGraph>,
    ingestion: Arc<IngestionModule>,
}

impl MemoryEngine {
    /// Builder entry point
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// The active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Memory store (C3)
    pub fn memories(&self) -> &Arc<MemoryStore> {
        &self.memories
    }

    /// Belief store (C4)
    pub fn beliefs(&self) -> &Arc<BeliefStore> {
        &self.beliefs
    }

    /// Knowledge graph queries (C8)
    pub fn graph(&self) -> &Arc<KnowledgeGraph> {
        &self.graph
    }

    /// Ingestion module (C9)
    pub fn ingestion(&self) -> &Arc<IngestionModule> {
        &self.ingestion
    }

    /// Shorthand for [`IngestionModule::ingest`]
    pub async fn ingest(&self, input: MemoryInput) -> Result<IngestionResult> {
        self.ingestion.ingest(input).await
    }

    /// Shorthand for [`IngestionModule::dry_run_ingest`]
    pub async fn dry_run_ingest(&self, input: MemoryInput) -> Result<IngestionResult> {
        self.ingestion.dry_run_ingest(input).await
    }

    /// Shorthand for [`IngestionModule::statistics`]
    pub fn statistics(&self) -> Result<EngineStats> {
        self.ingestion.statistics()
    }

    /// Shorthand for [`IngestionModule::is_healthy`]
    pub fn is_healthy(&self) -> bool {
        self.ingestion.is_healthy()
    }
}
