//! Batch orchestration: partial failure, resume, cancellation.

mod common;

use std::sync::Arc;
use tokio::sync::watch;

use lexrisk::aggregation::EntityAggregator;
use lexrisk::batch::{
    BatchOrchestrator, CheckpointStore, EntityOutcome, FsCheckpointStore, InMemoryCheckpointStore,
};
use lexrisk::documents::FsDocumentSource;
use lexrisk::embedding::{DocumentEmbedder, HashEmbedder};
use lexrisk::errors::PipelineError;
use lexrisk::index::InMemoryVectorIndex;
use lexrisk::types::EntityId;
use tempfile::tempdir;

use common::{company_document, orchestrator, test_config, write_entity, TEST_DIM};

fn entity_ids(ids: &[&str]) -> Vec<EntityId> {
    ids.iter().map(|id| EntityId::from(*id)).collect()
}

fn seed_entities(dir: &std::path::Path, ids: &[&str]) {
    for id in ids {
        write_entity(
            dir,
            id,
            &[company_document(
                &format!("{id}-10K"),
                "2024-01-01",
                &format!("{id} designs products. It sells them worldwide."),
                "Regulatory exposure may increase.",
            )],
        );
    }
}

#[tokio::test]
async fn fatal_entity_does_not_abort_the_batch() {
    let dir = tempdir().unwrap();
    seed_entities(dir.path(), &["A", "B", "D", "E"]);
    // Entity C's file is unparseable: a fatal per-entity error.
    std::fs::write(dir.path().join("C.json"), "{not valid json").unwrap();

    let index = Arc::new(InMemoryVectorIndex::new(TEST_DIM));
    let checkpoints = Arc::new(InMemoryCheckpointStore::new());
    let orchestrator = orchestrator(dir.path(), index.clone(), checkpoints.clone());

    let summary = orchestrator
        .run(entity_ids(&["A", "B", "C", "D", "E"]), true)
        .await
        .unwrap();

    assert_eq!(summary.total, 5);
    assert_eq!(summary.successful, 4);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 0);
    let failed = summary
        .results
        .iter()
        .find(|r| r.entity_id.as_str() == "C")
        .unwrap();
    assert!(matches!(failed.outcome, EntityOutcome::FailedFatal { .. }));

    // Document vector and at least one chunk per successful entity.
    assert!(index.len().await >= 8);

    let checkpoint = checkpoints.load().await.unwrap().unwrap();
    assert_eq!(checkpoint.processed_ids.len(), 4);
    assert!(checkpoint.failed_ids.contains_key("C"));
}

#[tokio::test]
async fn resume_skips_previously_processed_entities() {
    let dir = tempdir().unwrap();
    seed_entities(dir.path(), &["A", "B", "C"]);

    let index = Arc::new(InMemoryVectorIndex::new(TEST_DIM));
    let checkpoints = Arc::new(InMemoryCheckpointStore::new());

    let first = orchestrator(dir.path(), index.clone(), checkpoints.clone())
        .run(entity_ids(&["A", "B"]), true)
        .await
        .unwrap();
    assert_eq!(first.successful, 2);

    let second = orchestrator(dir.path(), index.clone(), checkpoints.clone())
        .run(entity_ids(&["A", "B", "C"]), true)
        .await
        .unwrap();
    assert_eq!(second.total, 3);
    assert_eq!(second.successful, 1);
    assert_eq!(second.skipped, 2);
    for result in &second.results {
        match result.entity_id.as_str() {
            "C" => assert_eq!(result.outcome, EntityOutcome::Succeeded),
            _ => assert_eq!(result.outcome, EntityOutcome::Skipped),
        }
    }
}

#[tokio::test]
async fn rerunning_a_completed_batch_processes_nothing() {
    let dir = tempdir().unwrap();
    seed_entities(dir.path(), &["A", "B", "C"]);

    let index = Arc::new(InMemoryVectorIndex::new(TEST_DIM));
    let checkpoints = Arc::new(InMemoryCheckpointStore::new());
    let runner = orchestrator(dir.path(), index.clone(), checkpoints.clone());

    runner.run(entity_ids(&["A", "B", "C"]), true).await.unwrap();
    let rerun = runner.run(entity_ids(&["A", "B", "C"]), true).await.unwrap();
    assert_eq!(rerun.successful, 0);
    assert_eq!(rerun.failed, 0);
    assert_eq!(rerun.skipped, 3);
}

#[tokio::test]
async fn no_resume_ignores_the_checkpoint() {
    let dir = tempdir().unwrap();
    seed_entities(dir.path(), &["A"]);

    let index = Arc::new(InMemoryVectorIndex::new(TEST_DIM));
    let checkpoints = Arc::new(InMemoryCheckpointStore::new());
    let runner = orchestrator(dir.path(), index.clone(), checkpoints.clone());

    runner.run(entity_ids(&["A"]), true).await.unwrap();
    let fresh = runner.run(entity_ids(&["A"]), false).await.unwrap();
    assert_eq!(fresh.successful, 1);
    assert_eq!(fresh.skipped, 0);
}

#[tokio::test]
async fn backend_dimension_mismatch_aborts_the_whole_run() {
    let dir = tempdir().unwrap();
    seed_entities(dir.path(), &["A", "B"]);

    // The backend produces 32-component vectors while the run is configured
    // for TEST_DIM: a misconfiguration, not a per-entity failure.
    let config = test_config();
    let embedder = DocumentEmbedder::new(Arc::new(HashEmbedder::new(32)), config.embedding.clone())
        .with_retry(config.retry);
    let index = Arc::new(InMemoryVectorIndex::new(TEST_DIM));
    let checkpoints = Arc::new(InMemoryCheckpointStore::new());
    let runner = BatchOrchestrator::new(
        Arc::new(FsDocumentSource::new(dir.path())),
        Arc::new(EntityAggregator::new()),
        Arc::new(embedder),
        index.clone(),
        checkpoints.clone(),
        config,
    );

    let err = runner.run(entity_ids(&["A", "B"]), true).await.unwrap_err();
    assert!(matches!(err, PipelineError::DimensionMismatch { .. }));

    // Nothing was indexed and no entity was charged with the failure.
    assert!(index.is_empty().await);
    let checkpoint = checkpoints.load().await.unwrap().unwrap_or_default();
    assert!(checkpoint.processed_ids.is_empty());
    assert!(checkpoint.failed_ids.is_empty());
}

#[tokio::test]
async fn corrupt_checkpoint_refuses_to_resume() {
    let dir = tempdir().unwrap();
    seed_entities(dir.path(), &["A"]);
    let checkpoint_path = dir.path().join("cp.json");
    std::fs::write(&checkpoint_path, "definitely not json").unwrap();

    let index = Arc::new(InMemoryVectorIndex::new(TEST_DIM));
    let checkpoints = Arc::new(FsCheckpointStore::new(&checkpoint_path));
    let runner = orchestrator(dir.path(), index.clone(), checkpoints.clone());

    let err = runner.run(entity_ids(&["A"]), true).await.unwrap_err();
    assert!(matches!(err, PipelineError::CheckpointCorrupt { .. }));

    // Explicit fresh start is the way past a damaged checkpoint.
    let summary = runner.run(entity_ids(&["A"]), false).await.unwrap();
    assert_eq!(summary.successful, 1);
}

#[tokio::test]
async fn checkpoint_survives_on_disk_between_runs() {
    let dir = tempdir().unwrap();
    seed_entities(dir.path(), &["A", "B"]);
    let checkpoint_path = dir.path().join("cp.json");

    {
        let index = Arc::new(InMemoryVectorIndex::new(TEST_DIM));
        let checkpoints = Arc::new(FsCheckpointStore::new(&checkpoint_path));
        orchestrator(dir.path(), index, checkpoints)
            .run(entity_ids(&["A", "B"]), true)
            .await
            .unwrap();
    }

    // A brand-new orchestrator over the same path resumes from disk.
    let index = Arc::new(InMemoryVectorIndex::new(TEST_DIM));
    let checkpoints = Arc::new(FsCheckpointStore::new(&checkpoint_path));
    let summary = orchestrator(dir.path(), index, checkpoints)
        .run(entity_ids(&["A", "B"]), true)
        .await
        .unwrap();
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.successful, 0);
}

#[tokio::test]
async fn cancellation_stops_new_entities_from_starting() {
    let dir = tempdir().unwrap();
    seed_entities(dir.path(), &["A", "B", "C", "D"]);

    let index = Arc::new(InMemoryVectorIndex::new(TEST_DIM));
    let checkpoints = Arc::new(InMemoryCheckpointStore::new());
    let runner = orchestrator(dir.path(), index.clone(), checkpoints.clone());

    let (tx, rx) = watch::channel(true);
    let summary = runner
        .run_with_cancellation(entity_ids(&["A", "B", "C", "D"]), true, rx)
        .await
        .unwrap();
    drop(tx);

    assert_eq!(summary.successful, 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.skipped, 4);
    assert!(index.is_empty().await);
}

#[tokio::test]
async fn summary_json_has_the_documented_shape() {
    let dir = tempdir().unwrap();
    seed_entities(dir.path(), &["A"]);

    let index = Arc::new(InMemoryVectorIndex::new(TEST_DIM));
    let checkpoints = Arc::new(InMemoryCheckpointStore::new());
    let summary = orchestrator(dir.path(), index, checkpoints)
        .run(entity_ids(&["A"]), true)
        .await
        .unwrap();

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["total"], 1);
    assert_eq!(json["successful"], 1);
    assert_eq!(json["results"][0]["entity_id"], "A");
    assert_eq!(json["results"][0]["outcome"]["status"], "succeeded");
}
