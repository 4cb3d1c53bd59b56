//! Per-entity consolidation of structured documents.
//!
//! The aggregator folds a time-ordered document set into one
//! [`ConsolidatedRecord`]: merged sections under per-kind policies, a
//! deduplicated mention set, and a relationship graph with evidence-weighted
//! edges. Re-processing the same source document is idempotent end to end.

pub mod aggregator;
pub mod cache;
pub mod graph;
pub mod normalize;
pub mod record;

pub use aggregator::EntityAggregator;
pub use cache::{FsMetadataCache, InMemoryMetadataCache, MetadataCache};
pub use graph::{RelationshipEdge, RelationshipGraph};
pub use normalize::AliasTable;
pub use record::{ConsolidatedRecord, MentionedEntity, MergedSection, MergedStatement, RecordMetadata};
