//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use lexrisk::aggregation::EntityAggregator;
use lexrisk::batch::{BatchOrchestrator, CheckpointStore};
use lexrisk::config::PipelineConfig;
use lexrisk::documents::{ExtractedRelationship, FsDocumentSource, SourceDocument};
use lexrisk::embedding::{DocumentEmbedder, HashEmbedder};
use lexrisk::index::VectorIndex;

pub const TEST_DIM: usize = 64;

/// A company document with business and risk-factor sections.
pub fn company_document(id: &str, date: &str, business: &str, risks: &str) -> SourceDocument {
    let mut sections = BTreeMap::new();
    sections.insert("business".to_string(), business.to_string());
    sections.insert("risk_factors".to_string(), risks.to_string());
    SourceDocument {
        source_document_id: id.to_string(),
        as_of_date: date.parse().expect("valid date"),
        sections,
        extracted_entities: vec![],
        extracted_relationships: vec![],
    }
}

pub fn with_relationship(
    mut doc: SourceDocument,
    subject: &str,
    predicate: &str,
    object: &str,
) -> SourceDocument {
    doc.extracted_relationships.push(ExtractedRelationship {
        subject: subject.to_string(),
        predicate: predicate.to_string(),
        object: object.to_string(),
    });
    doc
}

/// Write one entity's document file under `dir`.
pub fn write_entity(dir: &Path, entity_id: &str, documents: &[SourceDocument]) {
    let path = dir.join(format!("{entity_id}.json"));
    std::fs::write(&path, serde_json::to_string_pretty(documents).unwrap()).unwrap();
}

/// Test configuration: small vectors, instant retries, no enrichment.
pub fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.embedding.dimension = TEST_DIM;
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 5;
    config
}

/// Orchestrator over a filesystem document dir with the offline embedder.
pub fn orchestrator(
    documents_dir: &Path,
    index: Arc<dyn VectorIndex>,
    checkpoints: Arc<dyn CheckpointStore>,
) -> BatchOrchestrator {
    let config = test_config();
    BatchOrchestrator::new(
        Arc::new(FsDocumentSource::new(documents_dir)),
        Arc::new(EntityAggregator::new()),
        Arc::new(
            DocumentEmbedder::new(Arc::new(HashEmbedder::new(TEST_DIM)), config.embedding.clone())
                .with_retry(config.retry),
        ),
        index,
        checkpoints,
        config,
    )
}
