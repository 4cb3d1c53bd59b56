//! Structured input documents and the source seam the pipeline consumes.
//!
//! Parsing raw filings (HTML/CSV/XML) happens upstream; this crate receives
//! already-structured records. [`DocumentSource`] is the narrow async seam
//! the orchestrator pulls them through, with [`FsDocumentSource`] reading one
//! JSON file of documents per entity from a local directory.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::instrument;

use crate::errors::PipelineError;
use crate::types::{EntityId, EntityKind};

/// One structured document produced by the upstream parsing layer.
///
/// Section names arrive as free-form strings from the parser; they are mapped
/// onto the closed [`crate::types::SectionKind`] vocabulary during
/// aggregation, not here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Stable id of the raw source (accession number, regulation version id).
    pub source_document_id: String,
    /// Date the document speaks as of; drives merge ordering.
    pub as_of_date: NaiveDate,
    /// Section name → section text, as emitted by the parser.
    pub sections: BTreeMap<String, String>,
    /// Entities the upstream recognizer found in this document.
    #[serde(default)]
    pub extracted_entities: Vec<ExtractedEntity>,
    /// Relationships the upstream recognizer found in this document.
    #[serde(default)]
    pub extracted_relationships: Vec<ExtractedRelationship>,
}

impl SourceDocument {
    /// A document with an empty id or no sections cannot be merged and is
    /// treated as malformed input.
    pub fn validate(&self, entity_id: &EntityId) -> Result<(), PipelineError> {
        if self.source_document_id.trim().is_empty() {
            return Err(PipelineError::MalformedDocument {
                entity_id: entity_id.to_string(),
                document_id: "<missing>".to_string(),
                reason: "empty source_document_id".to_string(),
            });
        }
        if self.sections.is_empty() {
            return Err(PipelineError::MalformedDocument {
                entity_id: entity_id.to_string(),
                document_id: self.source_document_id.clone(),
                reason: "document has no sections".to_string(),
            });
        }
        Ok(())
    }
}

/// A mention of a named entity recognized in a document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub name: String,
    pub kind: EntityKind,
}

/// A subject-predicate-object triple recognized in a document.
///
/// The predicate arrives in its persisted string form and is decoded into
/// [`crate::types::Predicate`] during graph construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRelationship {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

/// Async seam over wherever structured documents live.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Load all documents for one entity, ordered oldest first.
    ///
    /// Returns [`PipelineError::EntityNotFound`] when the source has nothing
    /// at all for the id; an entity with an empty-but-present document set is
    /// a fatal input error handled the same way.
    async fn load(&self, entity_id: &EntityId) -> Result<Vec<SourceDocument>, PipelineError>;
}

/// Reads `<root>/<entity_id>.json`, a JSON array of [`SourceDocument`]s.
#[derive(Clone, Debug)]
pub struct FsDocumentSource {
    root: PathBuf,
}

impl FsDocumentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, entity_id: &EntityId) -> PathBuf {
        self.root.join(format!("{entity_id}.json"))
    }
}

#[async_trait]
impl DocumentSource for FsDocumentSource {
    #[instrument(skip(self), fields(entity_id = %entity_id), err)]
    async fn load(&self, entity_id: &EntityId) -> Result<Vec<SourceDocument>, PipelineError> {
        let path = self.path_for(entity_id);
        if !path.exists() {
            return Err(PipelineError::EntityNotFound {
                entity_id: entity_id.to_string(),
            });
        }
        let raw = fs::read_to_string(&path).await?;
        let mut documents: Vec<SourceDocument> =
            serde_json::from_str(&raw).map_err(|err| PipelineError::MalformedDocument {
                entity_id: entity_id.to_string(),
                document_id: path.display().to_string(),
                reason: err.to_string(),
            })?;
        documents.sort_by(|a, b| {
            a.as_of_date
                .cmp(&b.as_of_date)
                .then_with(|| a.source_document_id.cmp(&b.source_document_id))
        });
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn doc(id: &str, date: &str) -> SourceDocument {
        let mut sections = BTreeMap::new();
        sections.insert("business".to_string(), "Designs things.".to_string());
        SourceDocument {
            source_document_id: id.to_string(),
            as_of_date: date.parse().unwrap(),
            sections,
            extracted_entities: vec![],
            extracted_relationships: vec![],
        }
    }

    #[tokio::test]
    async fn fs_source_orders_by_date() {
        let dir = tempdir().unwrap();
        let docs = vec![doc("b", "2024-06-01"), doc("a", "2023-01-15")];
        let path = dir.path().join("AAPL.json");
        std::fs::write(&path, serde_json::to_string(&docs).unwrap()).unwrap();

        let source = FsDocumentSource::new(dir.path());
        let loaded = source.load(&EntityId::from("AAPL")).await.unwrap();
        assert_eq!(loaded[0].source_document_id, "a");
        assert_eq!(loaded[1].source_document_id, "b");
    }

    #[tokio::test]
    async fn missing_entity_is_not_found() {
        let dir = tempdir().unwrap();
        let source = FsDocumentSource::new(dir.path());
        let err = source.load(&EntityId::from("MSFT")).await.unwrap_err();
        assert!(matches!(err, PipelineError::EntityNotFound { .. }));
    }

    #[tokio::test]
    async fn unparseable_file_is_malformed() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("AAPL.json"), "{not json").unwrap();
        let source = FsDocumentSource::new(dir.path());
        let err = source.load(&EntityId::from("AAPL")).await.unwrap_err();
        assert!(matches!(err, PipelineError::MalformedDocument { .. }));
    }

    #[test]
    fn validation_rejects_empty_documents() {
        let id = EntityId::from("AAPL");
        let mut d = doc("10-K", "2024-01-01");
        d.sections.clear();
        assert!(d.validate(&id).is_err());
        let mut d = doc("10-K", "2024-01-01");
        d.source_document_id = String::new();
        assert!(d.validate(&id).is_err());
    }
}
