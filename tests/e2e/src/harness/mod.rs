//! Test engine harness
//!
//! Builds isolated [`MemoryEngine`] instances over temp-file databases so
//! tests cannot interfere with each other. The temp directory lives as long
//! as the harness value.

use std::sync::Arc;

use tempfile::TempDir;
use tenet_core::{
    Belief, BeliefExtractor, BeliefProposal, BeliefRepo, CategoryLabel, Categorizer,
    DeterministicEmbedder, EngineConfig, MemoryEngine, Polarity,
};

/// Embedding dimension used across the e2e suite; small enough to keep the
/// deterministic embedder cheap
pub const TEST_DIMENSIONS: usize = 128;

/// An engine plus the temp directory backing its database
pub struct TestEngine {
    /// The assembled engine under test
    pub engine: MemoryEngine,
    _temp_dir: TempDir,
}

impl TestEngine {
    /// Engine with default plug-ins and a test-sized embedding dimension
    pub fn new() -> Self {
        Self::with_config(Self::default_config())
    }

    /// Engine with a custom configuration and default plug-ins
    pub fn with_config(config: EngineConfig) -> Self {
        Self::build(config, None, None)
    }

    /// Engine with a custom extractor
    pub fn with_extractor(extractor: Arc<dyn BeliefExtractor>) -> Self {
        Self::build(Self::default_config(), Some(extractor), None)
    }

    /// Engine with custom configuration and extractor
    pub fn with_config_and_extractor(
        config: EngineConfig,
        extractor: Arc<dyn BeliefExtractor>,
    ) -> Self {
        Self::build(config, Some(extractor), None)
    }

    /// Engine with a custom categorizer
    pub fn with_categorizer(categorizer: Arc<dyn Categorizer>) -> Self {
        Self::build(Self::default_config(), None, Some(categorizer))
    }

    /// Baseline configuration for the suite
    pub fn default_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.embedding.dimension = TEST_DIMENSIONS;
        config
    }

    fn build(
        config: EngineConfig,
        extractor: Option<Arc<dyn BeliefExtractor>>,
        categorizer: Option<Arc<dyn Categorizer>>,
    ) -> Self {
        let temp_dir = TempDir::new().expect("temp dir");
        let db_path = temp_dir.path().join("tenet-test.db");

        let mut builder = MemoryEngine::builder(config)
            .with_database_path(&db_path)
            .expect("open test database");
        if let Some(extractor) = extractor {
            builder = builder.with_extractor(extractor);
        }
        if let Some(categorizer) = categorizer {
            builder = builder.with_categorizer(categorizer);
        }

        Self {
            engine: builder.build().expect("build engine"),
            _temp_dir: temp_dir,
        }
    }

    /// Embed a statement exactly the way the engine under test does
    pub fn embed(&self, text: &str) -> Vec<f32> {
        DeterministicEmbedder::new(TEST_DIMENSIONS)
            .embed_sync(text)
            .expect("embed")
            .vector
    }

    /// Seed a belief directly into the store, embedded and ready to match
    pub fn seed_belief(
        &self,
        agent_id: &str,
        statement: &str,
        confidence: f64,
        polarity: Polarity,
        reinforcement_count: i64,
    ) -> Belief {
        let proposal = BeliefProposal::new(statement, confidence, CategoryLabel::fallback())
            .with_polarity(polarity);
        let mut belief = Belief::from_proposal(&proposal, agent_id, "seed-memory");
        belief.reinforcement_count = reinforcement_count;
        belief.embedding = Some(self.embed(statement));
        self.engine
            .beliefs()
            .repo()
            .insert(&belief)
            .expect("seed belief");
        belief
    }

    /// Count all beliefs for an agent, inactive included
    pub fn belief_count(&self, agent_id: &str) -> i64 {
        self.engine
            .beliefs()
            .repo()
            .count(Some(agent_id))
            .expect("count beliefs")
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}
