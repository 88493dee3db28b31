//! Ingestion journeys: the full pipeline from input to stored memory and
//! updated beliefs

use std::sync::Arc;

use tenet_core::{ErrorKind, IngestionStatus, MemoryInput, MemoryRepo, Polarity};
use tenet_e2e_tests::{canonical_sky_extractor, TestEngine};

fn sky_input(agent_id: &str) -> MemoryInput {
    MemoryInput::new(agent_id, "The sky is blue.")
}

#[tokio::test]
async fn fresh_ingestion_creates_memory_and_belief() {
    let harness = TestEngine::with_extractor(Arc::new(canonical_sky_extractor()));
    let engine = &harness.engine;

    let result = engine.ingest(sky_input("a1")).await.unwrap();

    assert_eq!(result.status, IngestionStatus::Success);
    assert!(!result.partial);
    assert!(!result.dry_run);
    assert_eq!(result.agent_id, "a1");

    // The memory is durable and retrievable by the returned id
    let stored = engine
        .memories()
        .get(&result.memory_id, false)
        .unwrap()
        .expect("memory retrievable");
    assert_eq!(stored.content, "The sky is blue.");
    assert!(stored.embedding.is_some());

    // One new belief, nothing reinforced, no conflicts
    let update = result.belief_update_result.expect("belief analysis ran");
    assert_eq!(update.new_beliefs.len(), 1);
    assert_eq!(update.reinforced.len(), 0);
    assert_eq!(update.weakened.len(), 0);
    assert_eq!(update.conflicts.len(), 0);
    assert!((update.overall_confidence - 0.9).abs() < 1e-9);

    let belief = &update.new_beliefs[0];
    assert_eq!(belief.statement, "Sky is blue");
    assert!(belief.active);
    assert!(belief.evidence_memory_ids.contains(&result.memory_id));
}

#[tokio::test]
async fn reingest_reinforces_instead_of_recreating() {
    let harness = TestEngine::with_extractor(Arc::new(canonical_sky_extractor()));
    let engine = &harness.engine;

    let seeded = harness.seed_belief("a1", "Sky is blue", 0.6, Polarity::Positive, 1);

    let result = engine.ingest(sky_input("a1")).await.unwrap();
    let update = result.belief_update_result.unwrap();

    assert_eq!(update.reinforced.len(), 1);
    assert_eq!(update.new_beliefs.len(), 0);
    assert_eq!(update.conflicts.len(), 0);

    let reinforced = &update.reinforced[0];
    assert_eq!(reinforced.id, seeded.id);
    // 0.6 + 0.15 * 0.9
    assert!((reinforced.confidence - 0.735).abs() < 1e-9);
    assert_eq!(reinforced.reinforcement_count, 2);
    assert!(reinforced.evidence_memory_ids.contains(&result.memory_id));

    // The update is durable, not just projected
    let stored = engine.beliefs().get(&seeded.id).unwrap().unwrap();
    assert!((stored.confidence - 0.735).abs() < 1e-9);
    assert_eq!(stored.reinforcement_count, 2);

    // Re-ingesting the identical content reinforces again, still no new belief
    let again = engine.ingest(sky_input("a1")).await.unwrap();
    let update = again.belief_update_result.unwrap();
    assert_eq!(update.reinforced.len(), 1);
    assert_eq!(update.new_beliefs.len(), 0);
    assert_eq!(harness.belief_count("a1"), 1);
}

#[tokio::test]
async fn empty_extraction_is_success_with_empty_result() {
    // No rule matches this content, so the extractor returns no proposals
    let harness = TestEngine::with_extractor(Arc::new(canonical_sky_extractor()));
    let result = harness
        .engine
        .ingest(MemoryInput::new("a1", "Completely unrelated note."))
        .await
        .unwrap();

    assert_eq!(result.status, IngestionStatus::Success);
    let update = result.belief_update_result.unwrap();
    assert!(update.new_beliefs.is_empty());
    assert!(update.reinforced.is_empty());
    assert!(update.weakened.is_empty());
    assert!(update.conflicts.is_empty());
    assert!((update.overall_confidence - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn dry_run_projects_without_writing() {
    let harness = TestEngine::with_extractor(Arc::new(canonical_sky_extractor()));
    let engine = &harness.engine;

    let result = engine.dry_run_ingest(sky_input("a1")).await.unwrap();

    assert!(result.dry_run);
    assert!(result.memory_id.starts_with("dry-run-"));
    assert_eq!(result.status, IngestionStatus::Success);

    // Projected effects are present
    let update = result.belief_update_result.unwrap();
    assert_eq!(update.new_beliefs.len(), 1);

    // But nothing is visible to any subsequent read
    assert!(engine.memories().get(&result.memory_id, false).unwrap().is_none());
    assert_eq!(harness.belief_count("a1"), 0);
    assert_eq!(engine.memories().repo().count(Some("a1")).unwrap(), 0);

    // Dry-run projection for a seeded agreement also leaves the store alone
    let seeded = harness.seed_belief("a1", "Sky is blue", 0.6, Polarity::Positive, 1);
    let projected = engine.dry_run_ingest(sky_input("a1")).await.unwrap();
    let update = projected.belief_update_result.unwrap();
    assert_eq!(update.reinforced.len(), 1);
    assert!((update.reinforced[0].confidence - 0.735).abs() < 1e-9);

    let stored = engine.beliefs().get(&seeded.id).unwrap().unwrap();
    assert!((stored.confidence - 0.6).abs() < 1e-9);
    assert_eq!(stored.reinforcement_count, 1);
}

#[tokio::test]
async fn validation_is_fatal_and_repeatable() {
    let harness = TestEngine::new();
    let engine = &harness.engine;

    // Blank agent id
    let err = engine
        .ingest(MemoryInput::new("   ", "content"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    // Blank content
    let err = engine.ingest(MemoryInput::new("a1", "  ")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    // Content at the limit is accepted, one char over is rejected
    let at_limit = "x".repeat(10_000);
    let result = engine.ingest(MemoryInput::new("a1", at_limit)).await.unwrap();
    assert!(!result.memory_id.is_empty());

    let over_limit = "x".repeat(10_001);
    let err = engine
        .ingest(MemoryInput::new("a1", over_limit.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    // Same input, same verdict, no matter how often it is checked
    let input = MemoryInput::new("a1", over_limit);
    for _ in 0..3 {
        let verdict = engine.ingestion().validate_input(&input);
        assert_eq!(verdict.unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    // Agent id over the limit
    let err = engine
        .ingest(MemoryInput::new("a".repeat(101), "content"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn statistics_track_outcomes() {
    let harness = TestEngine::with_extractor(Arc::new(canonical_sky_extractor()));
    let engine = &harness.engine;

    engine.ingest(sky_input("a1")).await.unwrap();
    engine.ingest(sky_input("a2")).await.unwrap();
    let _ = engine.ingest(MemoryInput::new("", "bad")).await;
    engine.dry_run_ingest(sky_input("a1")).await.unwrap();

    let stats = engine.statistics().unwrap();
    assert_eq!(stats.received, 3);
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.dry_runs, 1);
    assert_eq!(stats.store.total_memories, 2);
    assert_eq!(stats.store.total_beliefs, 2);
    assert_eq!(stats.store.memories_with_embeddings, 2);

    assert!(engine.is_healthy());
}

#[tokio::test]
async fn agents_are_isolated() {
    let harness = TestEngine::with_extractor(Arc::new(canonical_sky_extractor()));
    let engine = &harness.engine;

    engine.ingest(sky_input("a1")).await.unwrap();
    let result = engine.ingest(sky_input("a2")).await.unwrap();

    // The second agent creates its own belief instead of reinforcing a1's
    let update = result.belief_update_result.unwrap();
    assert_eq!(update.new_beliefs.len(), 1);
    assert_eq!(update.reinforced.len(), 0);

    assert_eq!(harness.belief_count("a1"), 1);
    assert_eq!(harness.belief_count("a2"), 1);
}

#[tokio::test]
async fn access_tracking_advances_on_read() {
    let harness = TestEngine::new();
    let engine = &harness.engine;

    let result = engine.ingest(MemoryInput::new("a1", "tracked")).await.unwrap();

    engine.memories().get(&result.memory_id, true).unwrap();
    engine.memories().get(&result.memory_id, true).unwrap();
    let record = engine
        .memories()
        .get(&result.memory_id, false)
        .unwrap()
        .unwrap();
    assert_eq!(record.metadata.access_count, 2);
    assert!(record.metadata.last_accessed.is_some());

    // Repo-level count is scoped per agent
    assert_eq!(engine.memories().repo().count(Some("a1")).unwrap(), 1);
}
