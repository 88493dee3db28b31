//! Strategy equivalence: identical stores, identical result sets
//!
//! Three engines over the same database, one per strategy kind, must agree
//! on the membership of a threshold-0 query capped at the store size.

use std::collections::BTreeSet;

use tempfile::TempDir;
use tenet_core::{
    Belief, BeliefProposal, BeliefRepo, CategoryLabel, DeterministicEmbedder, EngineConfig,
    MemoryEngine, Query, StrategyKind,
};

const DIMENSIONS: usize = 128;

fn config(strategy: StrategyKind) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.embedding.dimension = DIMENSIONS;
    config.similarity.strategy = strategy;
    config
}

fn engine_at(path: &std::path::Path, strategy: StrategyKind) -> MemoryEngine {
    MemoryEngine::builder(config(strategy))
        .with_database_path(path)
        .expect("open shared database")
        .build()
        .expect("build engine")
}

fn seed_beliefs(engine: &MemoryEngine, statements: &[String]) {
    let embedder = DeterministicEmbedder::new(DIMENSIONS);
    for statement in statements {
        let proposal = BeliefProposal::new(statement, 0.8, CategoryLabel::fallback());
        let mut belief = Belief::from_proposal(&proposal, "a1", "seed-memory");
        belief.embedding = Some(embedder.embed_sync(statement).unwrap().vector);
        engine.beliefs().repo().insert(&belief).unwrap();
    }
}

async fn result_set(engine: &MemoryEngine, query: &str, k: usize) -> BTreeSet<String> {
    engine
        .beliefs()
        .similar(Query::Text(query), Some("a1"), 0.0, k, false)
        .await
        .unwrap()
        .into_iter()
        .map(|(belief, _)| belief.id)
        .collect()
}

#[tokio::test]
async fn all_strategies_agree_at_threshold_zero() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("shared.db");

    // Every statement shares the word "topic" so the keyword fetch covers
    // the whole store
    let statements: Vec<String> = (0..10)
        .map(|i| format!("topic entry number {i} holds a distinct fact"))
        .collect();

    let vector_engine = engine_at(&db_path, StrategyKind::Vector);
    seed_beliefs(&vector_engine, &statements);

    let text_engine = engine_at(&db_path, StrategyKind::Text);
    let auto_engine = engine_at(&db_path, StrategyKind::Auto);

    let query = "topic entry number 3 holds a distinct fact";
    let from_vector = result_set(&vector_engine, query, 10).await;
    let from_text = result_set(&text_engine, query, 10).await;
    let from_auto = result_set(&auto_engine, query, 10).await;

    assert_eq!(from_vector.len(), 10);
    assert_eq!(from_vector, from_text);
    assert_eq!(from_vector, from_auto);
}

#[tokio::test]
async fn search_contract_holds_per_strategy() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("contract.db");

    let statements: Vec<String> = (0..10)
        .map(|i| format!("topic entry number {i} holds a distinct fact"))
        .collect();

    let vector_engine = engine_at(&db_path, StrategyKind::Vector);
    seed_beliefs(&vector_engine, &statements);
    let text_engine = engine_at(&db_path, StrategyKind::Text);

    for engine in [&vector_engine, &text_engine] {
        let threshold = 0.2;
        let limit = 5;
        let hits = engine
            .beliefs()
            .similar(
                Query::Text("topic entry number 3 holds a distinct fact"),
                Some("a1"),
                threshold,
                limit,
                false,
            )
            .await
            .unwrap();

        // At most k results, every score at or above the threshold,
        // scores monotonically non-increasing
        assert!(hits.len() <= limit);
        for (_, score) in &hits {
            assert!(*score >= threshold);
            assert!(*score <= 1.0);
        }
        for pair in hits.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }
}

#[tokio::test]
async fn exact_match_ranks_first_in_both_paths() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("ranking.db");

    let statements: Vec<String> = (0..5)
        .map(|i| format!("topic entry number {i} holds a distinct fact"))
        .collect();

    let vector_engine = engine_at(&db_path, StrategyKind::Vector);
    seed_beliefs(&vector_engine, &statements);
    let text_engine = engine_at(&db_path, StrategyKind::Text);

    let query = "topic entry number 2 holds a distinct fact";
    for engine in [&vector_engine, &text_engine] {
        let hits = engine
            .beliefs()
            .similar(Query::Text(query), Some("a1"), 0.0, 5, false)
            .await
            .unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].0.statement, query);
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
    }
}

#[tokio::test]
async fn keyword_path_never_needs_embeddings() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("keyword-only.db");

    // Seed beliefs WITHOUT embeddings; only the keyword path can find them
    let text_engine = engine_at(&db_path, StrategyKind::Text);
    for i in 0..3 {
        let proposal = BeliefProposal::new(
            format!("topic entry number {i} holds a distinct fact"),
            0.8,
            CategoryLabel::fallback(),
        );
        let belief = Belief::from_proposal(&proposal, "a1", "seed-memory");
        text_engine.beliefs().repo().insert(&belief).unwrap();
    }

    let hits = text_engine
        .beliefs()
        .similar(Query::Text("topic facts"), Some("a1"), 0.0, 10, false)
        .await
        .unwrap();
    assert_eq!(hits.len(), 3);
}
