//! Conflict journeys: contradicting evidence weakens, supersedes, or
//! escalates to manual review

use std::sync::Arc;

use tenet_core::{
    ConflictResolution, ConflictSeverity, IngestionStatus, MemoryInput, Polarity, Query,
    RelationshipType,
};
use tenet_e2e_tests::{canonical_sky_extractor, TestEngine};

fn config_with(resolution: ConflictResolution) -> tenet_core::EngineConfig {
    let mut config = TestEngine::default_config();
    config.brca.default_resolution = resolution;
    config
}

/// The agent denies the sky is blue; the incoming memory asserts it is.
/// Same canonical statement, opposite polarity, similarity 1.0.
fn denial_harness(resolution: ConflictResolution) -> TestEngine {
    TestEngine::with_config_and_extractor(
        config_with(resolution),
        Arc::new(canonical_sky_extractor()),
    )
}

#[tokio::test]
async fn take_new_weakens_and_supersedes() {
    let harness = denial_harness(ConflictResolution::TakeNew);
    let engine = &harness.engine;

    let old = harness.seed_belief("a1", "Sky is blue", 0.5, Polarity::Negative, 0);

    let result = engine
        .ingest(MemoryInput::new("a1", "The sky is blue."))
        .await
        .unwrap();
    assert_eq!(result.status, IngestionStatus::Success);

    let update = result.belief_update_result.unwrap();
    assert_eq!(update.weakened.len(), 1);
    assert_eq!(update.new_beliefs.len(), 1);
    assert_eq!(update.conflicts.len(), 1);

    // Old belief: 0.5 - 0.3 * 0.9 = 0.23, above the 0.2 floor so still active
    let weakened = engine.beliefs().get(&old.id).unwrap().unwrap();
    assert!((weakened.confidence - 0.23).abs() < 1e-9);
    assert!(weakened.active);

    // New belief carries the proposal confidence
    let created = &update.new_beliefs[0];
    assert!((created.confidence - 0.9).abs() < 1e-9);
    assert_eq!(created.polarity, Polarity::Positive);

    // SUPERSEDES edge new -> old, visible through the graph queries
    assert_eq!(update.relationships.len(), 1);
    assert_eq!(
        update.relationships[0].relationship_type,
        RelationshipType::Supersedes
    );
    let superseding = engine
        .graph()
        .superseding_belief_ids("a1", &old.id)
        .unwrap();
    assert_eq!(superseding, vec![created.id.clone()]);
    let chain = engine.graph().deprecation_chain(&old.id).unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].id, created.id);

    // Conflict is persisted and resolved
    let conflicts = engine.beliefs().find_conflicts("a1", false).unwrap();
    assert_eq!(conflicts.len(), 1);
    assert!(conflicts[0].resolved);
    assert_eq!(conflicts[0].resolution, Some(ConflictResolution::TakeNew));
    assert_eq!(conflicts[0].severity, ConflictSeverity::Medium);
    assert_eq!(conflicts[0].memory_id.as_deref(), Some(result.memory_id.as_str()));
}

#[tokio::test]
async fn take_new_deactivates_below_threshold() {
    let harness = denial_harness(ConflictResolution::TakeNew);
    let engine = &harness.engine;

    // 0.3 - 0.27 = 0.03, under the 0.2 deactivation floor
    let old = harness.seed_belief("a1", "Sky is blue", 0.3, Polarity::Negative, 0);

    engine
        .ingest(MemoryInput::new("a1", "The sky is blue."))
        .await
        .unwrap();

    let stored = engine.beliefs().get(&old.id).unwrap().unwrap();
    assert!(!stored.active);
    assert!(stored.confidence < 0.2);

    // Inactive beliefs drop out of default similarity but stay queryable
    let visible = engine
        .beliefs()
        .similar(Query::Text("Sky is blue"), Some("a1"), 0.0, 10, false)
        .await
        .unwrap();
    assert!(visible.iter().all(|(b, _)| b.id != old.id));

    let with_inactive = engine
        .beliefs()
        .similar(Query::Text("Sky is blue"), Some("a1"), 0.0, 10, true)
        .await
        .unwrap();
    assert!(with_inactive.iter().any(|(b, _)| b.id == old.id));
}

#[tokio::test]
async fn manual_review_leaves_everything_untouched() {
    let harness = denial_harness(ConflictResolution::RequireManualReview);
    let engine = &harness.engine;

    let old = harness.seed_belief("a1", "Sky is blue", 0.5, Polarity::Negative, 0);
    let beliefs_before = harness.belief_count("a1");

    let result = engine
        .ingest(MemoryInput::new("a1", "The sky is blue."))
        .await
        .unwrap();

    // Conflict detection is not an error
    assert_eq!(result.status, IngestionStatus::Success);

    let update = result.belief_update_result.unwrap();
    assert_eq!(update.weakened.len(), 0);
    assert_eq!(update.new_beliefs.len(), 0);
    assert_eq!(update.conflicts.len(), 1);
    assert!(!update.conflicts[0].resolved);

    // Old belief untouched, no new belief created
    let stored = engine.beliefs().get(&old.id).unwrap().unwrap();
    assert!((stored.confidence - 0.5).abs() < 1e-9);
    assert_eq!(stored.version, old.version);
    assert_eq!(harness.belief_count("a1"), beliefs_before);

    // The open conflict is persisted for the review queue, then resolvable
    let pending = engine.beliefs().find_conflicts("a1", true).unwrap();
    assert_eq!(pending.len(), 1);

    let resolved = engine
        .beliefs()
        .resolve_conflict(
            &pending[0].id,
            ConflictResolution::KeepOld,
            "reviewer kept the original belief",
            0.8,
        )
        .unwrap();
    assert!(resolved.resolved);
    assert!(engine.beliefs().find_conflicts("a1", true).unwrap().is_empty());
}

#[tokio::test]
async fn mark_uncertain_discounts_both_sides() {
    let harness = denial_harness(ConflictResolution::MarkUncertain);
    let engine = &harness.engine;

    let old = harness.seed_belief("a1", "Sky is blue", 0.5, Polarity::Negative, 0);

    let result = engine
        .ingest(MemoryInput::new("a1", "The sky is blue."))
        .await
        .unwrap();
    let update = result.belief_update_result.unwrap();

    // Both sides scaled by 0.8
    let stored = engine.beliefs().get(&old.id).unwrap().unwrap();
    assert!((stored.confidence - 0.4).abs() < 1e-9);
    assert!(stored.active);

    assert_eq!(update.new_beliefs.len(), 1);
    assert!((update.new_beliefs[0].confidence - 0.72).abs() < 1e-9);

    let conflicts = engine.beliefs().find_conflicts("a1", false).unwrap();
    assert_eq!(conflicts.len(), 1);
    assert!(conflicts[0].resolved);
    assert_eq!(conflicts[0].resolution, Some(ConflictResolution::MarkUncertain));
}

#[tokio::test]
async fn keep_old_discards_the_proposal() {
    let harness = denial_harness(ConflictResolution::KeepOld);
    let engine = &harness.engine;

    let old = harness.seed_belief("a1", "Sky is blue", 0.5, Polarity::Negative, 0);

    let result = engine
        .ingest(MemoryInput::new("a1", "The sky is blue."))
        .await
        .unwrap();
    let update = result.belief_update_result.unwrap();

    assert!(update.new_beliefs.is_empty());
    assert!(update.weakened.is_empty());
    assert_eq!(update.conflicts.len(), 1);
    assert!(update.conflicts[0].resolved);

    let stored = engine.beliefs().get(&old.id).unwrap().unwrap();
    assert!((stored.confidence - 0.5).abs() < 1e-9);
    assert_eq!(harness.belief_count("a1"), 1);
}

#[tokio::test]
async fn archive_old_deactivates_and_closes_edges() {
    let harness = denial_harness(ConflictResolution::ArchiveOld);
    let engine = &harness.engine;

    let old = harness.seed_belief("a1", "Sky is blue", 0.7, Polarity::Negative, 0);
    let other = harness.seed_belief("a1", "Weather holds information", 0.7, Polarity::Positive, 0);

    // An open outgoing edge from the belief about to be archived
    let edge = tenet_core::BeliefRelationship::new(
        old.id.clone(),
        other.id.clone(),
        "a1",
        RelationshipType::Supports,
        0.8,
    )
    .unwrap();
    engine.graph().connect(&edge).unwrap();

    engine
        .ingest(MemoryInput::new("a1", "The sky is blue."))
        .await
        .unwrap();

    let archived = engine.beliefs().get(&old.id).unwrap().unwrap();
    assert!(!archived.active);

    // Its outgoing-as-current edge got an end stamp
    let outgoing = engine.graph().outgoing(&old.id, true).unwrap();
    let supports = outgoing
        .iter()
        .find(|e| e.relationship_type == RelationshipType::Supports)
        .expect("supports edge still present");
    assert!(supports.effective_until.is_some());

    // And the archive emitted a SUPERSEDES edge onto the old belief
    let superseding = engine
        .graph()
        .superseding_belief_ids("a1", &old.id)
        .unwrap();
    assert_eq!(superseding.len(), 1);
}

#[tokio::test]
async fn severity_tracks_confidence_gap() {
    // Gap 0.8 - 0.9 = 0.1 -> LOW
    let harness = denial_harness(ConflictResolution::KeepOld);
    harness.seed_belief("a1", "Sky is blue", 0.8, Polarity::Negative, 0);
    let result = harness
        .engine
        .ingest(MemoryInput::new("a1", "The sky is blue."))
        .await
        .unwrap();
    let update = result.belief_update_result.unwrap();
    assert_eq!(update.conflicts[0].severity, ConflictSeverity::Low);

    // Gap 0.2 - 0.9 = 0.7 -> HIGH
    let harness = denial_harness(ConflictResolution::KeepOld);
    harness.seed_belief("a2", "Sky is blue", 0.2, Polarity::Negative, 0);
    let result = harness
        .engine
        .ingest(MemoryInput::new("a2", "The sky is blue."))
        .await
        .unwrap();
    let update = result.belief_update_result.unwrap();
    assert_eq!(update.conflicts[0].severity, ConflictSeverity::High);
}
