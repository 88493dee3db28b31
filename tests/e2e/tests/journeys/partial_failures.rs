//! Degradation journeys: every non-fatal step failure leaves the memory
//! durable and the result PARTIAL

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use tenet_core::{ErrorKind, IngestionStatus, MemoryInput, MemoryRepo};
use tenet_e2e_tests::{FailingCategorizer, FailingExtractor, SleepyExtractor, TestEngine};

#[tokio::test]
async fn extractor_failure_degrades_to_partial() {
    let harness = TestEngine::with_extractor(Arc::new(FailingExtractor));
    let engine = &harness.engine;

    let result = engine
        .ingest(MemoryInput::new("a1", "The sky is blue."))
        .await
        .unwrap();

    assert_eq!(result.status, IngestionStatus::Partial);
    assert!(result.partial);
    assert!(result.belief_update_result.is_none());
    assert!(result.belief_analysis_error.is_some());

    // The memory itself is durable
    let stored = engine.memories().get(&result.memory_id, false).unwrap();
    assert!(stored.is_some());
    assert_eq!(harness.belief_count("a1"), 0);
}

#[tokio::test]
async fn brca_deadline_yields_timeout_tag() {
    let mut config = TestEngine::default_config();
    config.deadlines.brca = Duration::from_millis(100);

    let harness = TestEngine::with_config_and_extractor(
        config,
        Arc::new(SleepyExtractor {
            delay: Duration::from_secs(5),
        }),
    );
    let engine = &harness.engine;

    let result = engine
        .ingest(MemoryInput::new("a1", "The sky is blue."))
        .await
        .unwrap();

    assert_eq!(result.status, IngestionStatus::Partial);
    assert_eq!(result.belief_analysis_error.as_deref(), Some("timeout"));
    assert!(result.belief_update_result.is_none());

    // Memory write stands despite the analysis timeout
    assert!(engine.memories().get(&result.memory_id, false).unwrap().is_some());
}

#[tokio::test]
async fn extract_deadline_inside_brca_also_times_out() {
    let mut config = TestEngine::default_config();
    config.deadlines.extract = Duration::from_millis(50);

    let harness = TestEngine::with_config_and_extractor(
        config,
        Arc::new(SleepyExtractor {
            delay: Duration::from_secs(5),
        }),
    );

    let result = harness
        .engine
        .ingest(MemoryInput::new("a1", "note"))
        .await
        .unwrap();
    assert_eq!(result.status, IngestionStatus::Partial);
    assert_eq!(result.belief_analysis_error.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn categorizer_failure_falls_back_to_general() {
    let harness = TestEngine::with_categorizer(Arc::new(FailingCategorizer));
    let engine = &harness.engine;

    let result = engine
        .ingest(MemoryInput::new("a1", "uncategorizable"))
        .await
        .unwrap();

    assert_eq!(result.status, IngestionStatus::Partial);
    assert_eq!(result.category.primary, "general");
    assert_eq!(result.category.secondary.as_deref(), Some("information"));
    assert!((result.category.confidence - 0.5).abs() < 1e-9);

    // The stored record carries the fallback label too
    let stored = engine
        .memories()
        .get(&result.memory_id, false)
        .unwrap()
        .unwrap();
    assert_eq!(stored.category.primary, "general");
}

#[tokio::test]
async fn cancellation_before_write_persists_nothing() {
    let harness = TestEngine::new();
    let engine = &harness.engine;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = engine
        .ingestion()
        .ingest_with_cancel(MemoryInput::new("a1", "never stored"), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Canceled);
    assert_eq!(engine.memories().repo().count(Some("a1")).unwrap(), 0);
}

#[tokio::test]
async fn overload_rejects_immediately() {
    let mut config = TestEngine::default_config();
    config.ingestion.max_inflight = 0;

    let harness = TestEngine::with_config(config);
    let err = harness
        .engine
        .ingest(MemoryInput::new("a1", "rejected"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Overloaded);

    let stats = harness.engine.statistics().unwrap();
    assert_eq!(stats.rejected_overloaded, 1);
    assert_eq!(stats.received, 0);
}

#[tokio::test]
async fn disabled_embeddings_store_without_vectors() {
    let mut config = TestEngine::default_config();
    config.embedding.enabled = false;

    let harness = TestEngine::with_config(config);
    let engine = &harness.engine;

    let result = engine
        .ingest(MemoryInput::new("a1", "The parser handles comments."))
        .await
        .unwrap();

    let stored = engine
        .memories()
        .get(&result.memory_id, false)
        .unwrap()
        .unwrap();
    assert!(stored.embedding.is_none());

    // With embeddings off entirely, a missing vector is not a degradation
    assert_eq!(result.status, IngestionStatus::Success);
    assert_eq!(engine.statistics().unwrap().store.memories_with_embeddings, 0);
}
