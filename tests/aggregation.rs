//! End-to-end aggregation over filesystem document sets.

mod common;

use std::sync::Arc;

use lexrisk::aggregation::{EntityAggregator, InMemoryMetadataCache, MetadataCache};
use lexrisk::documents::{DocumentSource, FsDocumentSource};
use lexrisk::types::{EntityClass, EntityId, Predicate, SectionKind};
use tempfile::tempdir;

use common::{company_document, with_relationship, write_entity};

#[tokio::test]
async fn load_then_aggregate_merges_across_filings() {
    let dir = tempdir().unwrap();
    let docs = vec![
        with_relationship(
            company_document(
                "10-K-2023",
                "2023-09-30",
                "Designs consumer hardware. Operates retail stores worldwide.",
                "Supply chains concentrate in one region.",
            ),
            "Apple",
            "manufactures_in",
            "China",
        ),
        with_relationship(
            company_document(
                "10-K-2024",
                "2024-09-28",
                "Designs consumer hardware. Invests in on-device intelligence.",
                "Supply chains concentrate in one region. New AI rules may restrict features.",
            ),
            "Apple",
            "manufactures_in",
            "China",
        ),
    ];
    write_entity(dir.path(), "AAPL", &docs);

    let source = FsDocumentSource::new(dir.path());
    let entity_id = EntityId::from("AAPL");
    let loaded = source.load(&entity_id).await.unwrap();
    let record = EntityAggregator::new()
        .aggregate(&entity_id, EntityClass::Company, &loaded)
        .await
        .unwrap();

    // Business: 2024 text leads, the displaced 2023 sentence is appended.
    let business = record.section_text(&SectionKind::Business).unwrap();
    assert!(business.starts_with("Designs consumer hardware."));
    assert!(business.contains("Operates retail stores worldwide."));

    // Risk factors: union, deduplicated.
    let risks = &record.sections[&SectionKind::RiskFactors];
    assert_eq!(risks.statements.len(), 2);

    // Same relationship from two sources: one edge, two evidence entries.
    let edges = record.relationships.outgoing("apple").unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].evidence.len(), 2);
    assert!((edges[0].weight - 0.4).abs() < 1e-6);
    assert_eq!(edges[0].predicate, Predicate::ManufacturesIn);

    assert_eq!(
        record.metadata.latest_document_date,
        Some("2024-09-28".parse().unwrap())
    );
    assert!(record.metadata.regions.contains("china"));
}

#[tokio::test]
async fn aggregating_the_same_file_twice_changes_nothing() {
    let dir = tempdir().unwrap();
    let docs = vec![with_relationship(
        company_document(
            "10-K",
            "2024-01-01",
            "Builds electric vehicles.",
            "Battery supply is constrained.",
        ),
        "Tesla",
        "operates_in",
        "Germany",
    )];
    write_entity(dir.path(), "TSLA", &docs);

    let source = FsDocumentSource::new(dir.path());
    let entity_id = EntityId::from("TSLA");
    let loaded = source.load(&entity_id).await.unwrap();
    let aggregator = EntityAggregator::new();

    let once = aggregator
        .aggregate(&entity_id, EntityClass::Company, &loaded)
        .await
        .unwrap();
    let mut doubled = loaded.clone();
    doubled.extend(loaded.clone());
    let twice = aggregator
        .aggregate(&entity_id, EntityClass::Company, &doubled)
        .await
        .unwrap();

    assert_eq!(once.sections, twice.sections);
    assert_eq!(once.relationships, twice.relationships);
    assert_eq!(once.entities_mentioned, twice.entities_mentioned);
}

#[tokio::test]
async fn enrichment_cache_fills_missing_classification() {
    let dir = tempdir().unwrap();
    write_entity(
        dir.path(),
        "NVDA",
        &[company_document(
            "10-K",
            "2024-01-01",
            "Designs accelerators.",
            "Export controls tighten.",
        )],
    );

    let cache = Arc::new(InMemoryMetadataCache::new(3600));
    cache
        .put(
            "enrichment:NVDA",
            serde_json::json!({"sector": "Semiconductors", "jurisdiction": "US"}),
        )
        .await
        .unwrap();

    let source = FsDocumentSource::new(dir.path());
    let entity_id = EntityId::from("NVDA");
    let loaded = source.load(&entity_id).await.unwrap();
    let record = EntityAggregator::new()
        .with_cache(cache)
        .aggregate(&entity_id, EntityClass::Company, &loaded)
        .await
        .unwrap();

    assert_eq!(record.metadata.sector.as_deref(), Some("Semiconductors"));
    assert_eq!(record.metadata.jurisdiction.as_deref(), Some("US"));
}
