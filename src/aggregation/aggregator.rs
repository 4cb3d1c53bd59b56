//! The entity aggregator: merge policies, mention dedup, graph construction.

use chrono::Utc;
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::aggregation::cache::MetadataCache;
use crate::aggregation::normalize::{split_sentences, statement_hash, AliasTable};
use crate::aggregation::record::{
    ConsolidatedRecord, MentionedEntity, MergedSection, MergedStatement,
};
use crate::documents::SourceDocument;
use crate::errors::PipelineError;
use crate::types::{EntityClass, EntityId, Predicate, SectionKind};

/// Merges a time-ordered document set into one [`ConsolidatedRecord`].
///
/// Merge policy is dispatched per [`SectionKind`]:
/// - `Business`: latest text wins; sentences from superseded documents that
///   do not reappear in the newest text are appended with their provenance.
/// - `RiskFactors` and `Other`: union of distinct statements, deduplicated by
///   normalized-text hash. Nothing is ever dropped.
/// - `SignificantEvents`: appended in document-date order, never overwritten.
///
/// A malformed document is skipped with a logged reason and never aborts the
/// rest of the entity.
pub struct EntityAggregator {
    aliases: AliasTable,
    cache: Option<Arc<dyn MetadataCache>>,
}

impl EntityAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            aliases: AliasTable::new(),
            cache: None,
        }
    }

    #[must_use]
    pub fn with_aliases(mut self, aliases: AliasTable) -> Self {
        self.aliases = aliases;
        self
    }

    /// Attach an enrichment cache consulted for sector/jurisdiction when the
    /// documents themselves carry none.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn MetadataCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Consolidate `documents` (oldest first) for one entity.
    ///
    /// Fails only when no document survives validation; individual bad
    /// documents are skipped.
    #[instrument(skip(self, documents), fields(entity_id = %entity_id, docs = documents.len()), err)]
    pub async fn aggregate(
        &self,
        entity_id: &EntityId,
        class: EntityClass,
        documents: &[SourceDocument],
    ) -> Result<ConsolidatedRecord, PipelineError> {
        let mut record = ConsolidatedRecord::new(entity_id.clone(), class);
        let mut merger = SectionMerger::default();
        let mut merged_any = false;

        for document in documents {
            if let Err(err) = document.validate(entity_id) {
                warn!(
                    entity_id = %entity_id,
                    document_id = %document.source_document_id,
                    error = %err,
                    "skipping malformed document"
                );
                continue;
            }
            self.merge_document(&mut record, &mut merger, document);
            merged_any = true;
        }

        if !merged_any {
            return Err(PipelineError::MalformedDocument {
                entity_id: entity_id.to_string(),
                document_id: "<all>".to_string(),
                reason: "no valid documents to aggregate".to_string(),
            });
        }

        record.sections = merger.finish();
        record.metadata.regions = {
            let mut regions = record.relationships.objects_of(&Predicate::OperatesIn);
            regions.extend(record.relationships.objects_of(&Predicate::ManufacturesIn));
            regions
        };
        self.apply_enrichment(&mut record).await?;
        debug!(
            entity_id = %entity_id,
            sections = record.sections.len(),
            mentions = record.entities_mentioned.len(),
            edges = record.relationships.edge_count(),
            "aggregated entity"
        );
        Ok(record)
    }

    fn merge_document(
        &self,
        record: &mut ConsolidatedRecord,
        merger: &mut SectionMerger,
        document: &SourceDocument,
    ) {
        for (name, text) in &document.sections {
            merger.merge(
                SectionKind::decode(name),
                text,
                &document.source_document_id,
                document.as_of_date,
            );
        }

        for entity in &document.extracted_entities {
            let normalized = self.aliases.normalize(&entity.name);
            if normalized.is_empty() {
                continue;
            }
            // BTreeSet keyed by (normalized, kind): conflicting kinds stay
            // as separate typed entries; the first-seen spelling wins.
            let already = record
                .entities_mentioned
                .iter()
                .any(|m| m.normalized_name == normalized && m.kind == entity.kind);
            if !already {
                record.entities_mentioned.insert(MentionedEntity {
                    normalized_name: normalized,
                    kind: entity.kind,
                    display_name: entity.name.clone(),
                });
            }
        }

        for rel in &document.extracted_relationships {
            let subject = self.aliases.normalize(&rel.subject);
            let object = self.aliases.normalize(&rel.object);
            if subject.is_empty() || object.is_empty() {
                continue;
            }
            record.relationships.observe(
                &subject,
                Predicate::decode(&rel.predicate),
                &object,
                &document.source_document_id,
            );
        }

        let date = document.as_of_date;
        record.metadata.latest_document_date = Some(
            record
                .metadata
                .latest_document_date
                .map_or(date, |d| d.max(date)),
        );
    }

    async fn apply_enrichment(&self, record: &mut ConsolidatedRecord) -> Result<(), PipelineError> {
        let Some(cache) = &self.cache else {
            return Ok(());
        };
        if record.metadata.sector.is_some() && record.metadata.jurisdiction.is_some() {
            return Ok(());
        }
        let key = format!("enrichment:{}", record.entity_id);
        let Some(value) = cache.get(&key).await? else {
            return Ok(());
        };
        if record.metadata.sector.is_none() {
            record.metadata.sector = value
                .get("sector")
                .and_then(|v| v.as_str())
                .map(str::to_string);
        }
        if record.metadata.jurisdiction.is_none() {
            record.metadata.jurisdiction = value
                .get("jurisdiction")
                .and_then(|v| v.as_str())
                .map(str::to_string);
        }
        record.metadata.enriched_at = Some(Utc::now());
        Ok(())
    }
}

impl Default for EntityAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Accumulates sections across documents, applying the per-kind policy.
#[derive(Default)]
struct SectionMerger {
    /// Business: newest document's sentences.
    business_latest: Vec<MergedStatement>,
    /// Business: unique sentences from superseded documents.
    business_appendix: Vec<MergedStatement>,
    /// Union and chronological sections, in arrival order.
    accumulated: BTreeMap<SectionKind, Vec<MergedStatement>>,
    /// Seen statement hashes per section, and per (section, source) for
    /// chronological sections.
    seen: BTreeMap<SectionKind, FxHashSet<u64>>,
}

impl SectionMerger {
    fn merge(
        &mut self,
        kind: SectionKind,
        text: &str,
        source_document_id: &str,
        as_of_date: chrono::NaiveDate,
    ) {
        match kind {
            SectionKind::Business => self.merge_latest_wins(text, source_document_id, as_of_date),
            SectionKind::SignificantEvents => self.merge_chronological(
                SectionKind::SignificantEvents,
                text,
                source_document_id,
                as_of_date,
            ),
            other => self.merge_union(other, text, source_document_id, as_of_date),
        }
    }

    /// Latest-wins with append: the newest document's sentences replace the
    /// current text; displaced sentences that do not reappear are moved to
    /// the appendix exactly once.
    fn merge_latest_wins(
        &mut self,
        text: &str,
        source_document_id: &str,
        as_of_date: chrono::NaiveDate,
    ) {
        let incoming: Vec<MergedStatement> = split_sentences(text)
            .into_iter()
            .map(|sentence| MergedStatement {
                text: sentence.to_string(),
                source_document_id: source_document_id.to_string(),
                as_of_date,
            })
            .collect();
        let incoming_hashes: FxHashSet<u64> =
            incoming.iter().map(|s| statement_hash(&s.text)).collect();

        let appendix_seen = self.seen.entry(SectionKind::Business).or_default();
        for displaced in self.business_latest.drain(..) {
            let hash = statement_hash(&displaced.text);
            if !incoming_hashes.contains(&hash) && appendix_seen.insert(hash) {
                self.business_appendix.push(displaced);
            }
        }
        self.business_latest = incoming;
    }

    /// Union: keep every distinct statement, first occurrence wins.
    fn merge_union(
        &mut self,
        kind: SectionKind,
        text: &str,
        source_document_id: &str,
        as_of_date: chrono::NaiveDate,
    ) {
        let seen = self.seen.entry(kind.clone()).or_default();
        let statements = self.accumulated.entry(kind).or_default();
        for sentence in split_sentences(text) {
            if seen.insert(statement_hash(sentence)) {
                statements.push(MergedStatement {
                    text: sentence.to_string(),
                    source_document_id: source_document_id.to_string(),
                    as_of_date,
                });
            }
        }
    }

    /// Chronological: append in document order; a re-processed source must
    /// not duplicate its statements, so dedup is by statement hash.
    fn merge_chronological(
        &mut self,
        kind: SectionKind,
        text: &str,
        source_document_id: &str,
        as_of_date: chrono::NaiveDate,
    ) {
        self.merge_union(kind, text, source_document_id, as_of_date);
    }

    fn finish(mut self) -> BTreeMap<SectionKind, MergedSection> {
        let mut sections: BTreeMap<SectionKind, MergedSection> = self
            .accumulated
            .into_iter()
            .map(|(kind, statements)| (kind, MergedSection { statements }))
            .collect();
        if !self.business_latest.is_empty() || !self.business_appendix.is_empty() {
            // A sentence displaced by one document can reappear in a later
            // document's latest text; it must not then surface twice.
            let latest_hashes: FxHashSet<u64> = self
                .business_latest
                .iter()
                .map(|s| statement_hash(&s.text))
                .collect();
            let mut statements = std::mem::take(&mut self.business_latest);
            statements.extend(
                self.business_appendix
                    .drain(..)
                    .filter(|s| !latest_hashes.contains(&statement_hash(&s.text))),
            );
            sections.insert(SectionKind::Business, MergedSection { statements });
        }
        sections
    }
}
