//! The consolidated per-entity record the rest of the pipeline consumes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::aggregation::graph::RelationshipGraph;
use crate::types::{EntityClass, EntityId, EntityKind, SectionKind};

/// One merged statement with its provenance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergedStatement {
    pub text: String,
    pub source_document_id: String,
    pub as_of_date: NaiveDate,
}

/// A section after merging, preserving statement order and provenance.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedSection {
    pub statements: Vec<MergedStatement>,
}

impl MergedSection {
    /// Full merged text, statements joined by single spaces.
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::new();
        for statement in &self.statements {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&statement.text);
        }
        out
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// A deduplicated entity mention. Ordering is by normalized name then kind so
/// conflicting kinds for one name sit adjacent as separate typed entries.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MentionedEntity {
    pub normalized_name: String,
    pub kind: EntityKind,
    /// First-seen surface spelling, kept for display.
    pub display_name: String,
}

/// Classification and freshness metadata for a consolidated record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub sector: Option<String>,
    pub jurisdiction: Option<String>,
    /// Normalized region names the entity is exposed to, derived from
    /// operates_in/manufactures_in edges.
    pub regions: BTreeSet<String>,
    /// Date of the most recent merged document.
    pub latest_document_date: Option<NaiveDate>,
    /// Regulation effective date, when the entity is a regulation.
    pub effective_date: Option<NaiveDate>,
    /// When cached external enrichment was last applied.
    pub enriched_at: Option<DateTime<Utc>>,
}

/// One entity's consolidated view across all its source documents.
///
/// Append-only per source: feeding the same source document through the
/// aggregator twice yields an identical record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedRecord {
    pub entity_id: EntityId,
    pub class: EntityClass,
    pub sections: BTreeMap<SectionKind, MergedSection>,
    pub entities_mentioned: BTreeSet<MentionedEntity>,
    pub relationships: RelationshipGraph,
    pub metadata: RecordMetadata,
}

impl ConsolidatedRecord {
    #[must_use]
    pub fn new(entity_id: EntityId, class: EntityClass) -> Self {
        Self {
            entity_id,
            class,
            sections: BTreeMap::new(),
            entities_mentioned: BTreeSet::new(),
            relationships: RelationshipGraph::new(),
            metadata: RecordMetadata::default(),
        }
    }

    /// Merged text of one section, if present and nonempty.
    #[must_use]
    pub fn section_text(&self, kind: &SectionKind) -> Option<String> {
        self.sections
            .get(kind)
            .filter(|s| !s.is_empty())
            .map(MergedSection::text)
    }

    /// Sections in presentation order with their statements, for chunking.
    pub fn iter_sections(&self) -> impl Iterator<Item = (&SectionKind, &MergedSection)> {
        self.sections.iter().filter(|(_, s)| !s.is_empty())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.values().all(MergedSection::is_empty)
    }
}
