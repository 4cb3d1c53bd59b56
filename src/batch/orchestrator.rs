//! The batch orchestrator.
//!
//! Drives aggregate → embed → index across an entity set with bounded
//! parallelism. Each entity runs its three stages strictly sequentially
//! inside one task; the checkpoint is committed after every terminal outcome
//! so a crash loses at most the in-flight entities. Per-entity errors never
//! unwind past the entity boundary; systemic errors abort the run.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use crate::aggregation::EntityAggregator;
use crate::batch::checkpoint::{Checkpoint, CheckpointStore};
use crate::batch::retry::retry_with_backoff;
use crate::config::PipelineConfig;
use crate::documents::DocumentSource;
use crate::embedding::{ChunkEmbedding, DocumentEmbedder, DocumentEmbedding};
use crate::errors::{ErrorClass, PipelineError};
use crate::index::{Metadata, MetadataValue, VectorIndex};
use crate::types::{EntityClass, EntityId};

/// Terminal state of one entity within a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum EntityOutcome {
    Succeeded,
    /// Already processed in a prior run, or the run was cancelled before the
    /// entity started.
    Skipped,
    FailedFatal { error: String },
    FailedExhausted { error: String, attempts: u32 },
}

impl EntityOutcome {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::FailedFatal { .. } | Self::FailedExhausted { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityResult {
    pub entity_id: EntityId,
    pub outcome: EntityOutcome,
}

/// Final run summary. Partial success is a normal, reportable outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub results: Vec<EntityResult>,
}

impl BatchSummary {
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Runs the three-stage pipeline across many entities.
pub struct BatchOrchestrator {
    source: Arc<dyn DocumentSource>,
    aggregator: Arc<EntityAggregator>,
    embedder: Arc<DocumentEmbedder>,
    index: Arc<dyn VectorIndex>,
    checkpoints: Arc<dyn CheckpointStore>,
    config: PipelineConfig,
    class: EntityClass,
}

impl BatchOrchestrator {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        aggregator: Arc<EntityAggregator>,
        embedder: Arc<DocumentEmbedder>,
        index: Arc<dyn VectorIndex>,
        checkpoints: Arc<dyn CheckpointStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source,
            aggregator,
            embedder,
            index,
            checkpoints,
            config,
            class: EntityClass::Company,
        }
    }

    /// Entity class stamped onto every indexed vector from this run.
    #[must_use]
    pub fn with_class(mut self, class: EntityClass) -> Self {
        self.class = class;
        self
    }

    /// Run without an external cancellation signal.
    pub async fn run(
        &self,
        entity_ids: Vec<EntityId>,
        resume: bool,
    ) -> Result<BatchSummary, PipelineError> {
        let (_tx, rx) = watch::channel(false);
        self.run_with_cancellation(entity_ids, resume, rx).await
    }

    /// Run the batch. With `resume`, entities recorded as processed in the
    /// checkpoint are skipped entirely; without it any existing checkpoint is
    /// ignored and overwritten as the run progresses.
    ///
    /// Setting the watch value to `true` stops new entities from starting;
    /// in-flight entities finish and checkpoint normally.
    #[instrument(skip(self, entity_ids, cancel), fields(total = entity_ids.len(), resume))]
    pub async fn run_with_cancellation(
        &self,
        entity_ids: Vec<EntityId>,
        resume: bool,
        cancel: watch::Receiver<bool>,
    ) -> Result<BatchSummary, PipelineError> {
        let run_id = uuid::Uuid::new_v4();
        let checkpoint = if resume {
            self.checkpoints.load().await?.unwrap_or_default()
        } else {
            Checkpoint::new()
        };
        info!(
            %run_id,
            already_processed = checkpoint.processed_ids.len(),
            "starting batch run"
        );

        let total = entity_ids.len();
        let mut results: Vec<EntityResult> = Vec::with_capacity(total);
        let mut pending: Vec<EntityId> = Vec::new();
        for entity_id in entity_ids {
            if checkpoint.is_processed(&entity_id) {
                results.push(EntityResult {
                    entity_id,
                    outcome: EntityOutcome::Skipped,
                });
            } else {
                pending.push(entity_id);
            }
        }

        let checkpoint = Arc::new(Mutex::new(checkpoint));
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism));
        let mut tasks: JoinSet<Result<EntityResult, PipelineError>> = JoinSet::new();

        for entity_id in pending {
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let checkpoint = Arc::clone(&checkpoint);
            let checkpoints = Arc::clone(&self.checkpoints);
            let source = Arc::clone(&self.source);
            let aggregator = Arc::clone(&self.aggregator);
            let embedder = Arc::clone(&self.embedder);
            let index = Arc::clone(&self.index);
            let retry = self.config.retry;
            let class = self.class;

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| PipelineError::Config("worker pool closed".to_string()))?;
                if *cancel.borrow() {
                    return Ok(EntityResult {
                        entity_id,
                        outcome: EntityOutcome::Skipped,
                    });
                }

                let unit = retry_with_backoff(&retry, || {
                    process_entity(
                        &entity_id,
                        class,
                        Arc::clone(&source),
                        Arc::clone(&aggregator),
                        Arc::clone(&embedder),
                        Arc::clone(&index),
                    )
                })
                .await;

                let outcome = match unit {
                    Ok(()) => {
                        let mut guard = checkpoint.lock().await;
                        guard.mark_processed(&entity_id);
                        checkpoints.save(&guard).await?;
                        EntityOutcome::Succeeded
                    }
                    Err(err) if err.is_systemic() => {
                        error!(entity_id = %entity_id, error = %err, "systemic error, aborting run");
                        return Err(err);
                    }
                    Err(err) => {
                        let outcome = match err.class() {
                            ErrorClass::Fatal => EntityOutcome::FailedFatal {
                                error: err.to_string(),
                            },
                            _ => EntityOutcome::FailedExhausted {
                                error: err.to_string(),
                                attempts: retry.max_attempts,
                            },
                        };
                        warn!(entity_id = %entity_id, error = %err, "entity failed");
                        let attempts = match &outcome {
                            EntityOutcome::FailedExhausted { attempts, .. } => *attempts,
                            _ => 1,
                        };
                        let mut guard = checkpoint.lock().await;
                        guard.mark_failed(&entity_id, err.to_string(), attempts);
                        checkpoints.save(&guard).await?;
                        outcome
                    }
                };
                Ok(EntityResult { entity_id, outcome })
            });
        }

        let mut completed = 0usize;
        while let Some(joined) = tasks.join_next().await {
            let result = match joined? {
                Ok(result) => result,
                Err(err) => {
                    tasks.abort_all();
                    return Err(err);
                }
            };
            if result.outcome != EntityOutcome::Skipped {
                completed += 1;
                if self.config.progress_every > 0 && completed % self.config.progress_every == 0 {
                    let succeeded = results
                        .iter()
                        .filter(|r| r.outcome == EntityOutcome::Succeeded)
                        .count()
                        + usize::from(result.outcome == EntityOutcome::Succeeded);
                    let failed = results.iter().filter(|r| r.outcome.is_failure()).count()
                        + usize::from(result.outcome.is_failure());
                    info!(completed, succeeded, failed, total, "batch progress");
                }
            }
            results.push(result);
        }

        results.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        let successful = results
            .iter()
            .filter(|r| r.outcome == EntityOutcome::Succeeded)
            .count();
        let failed = results.iter().filter(|r| r.outcome.is_failure()).count();
        let skipped = results
            .iter()
            .filter(|r| r.outcome == EntityOutcome::Skipped)
            .count();
        let summary = BatchSummary {
            total,
            successful,
            failed,
            skipped,
            results,
        };
        info!(
            total = summary.total,
            successful = summary.successful,
            failed = summary.failed,
            skipped = summary.skipped,
            "batch complete"
        );
        Ok(summary)
    }
}

/// One entity's three stages, run strictly in order.
async fn process_entity(
    entity_id: &EntityId,
    class: EntityClass,
    source: Arc<dyn DocumentSource>,
    aggregator: Arc<EntityAggregator>,
    embedder: Arc<DocumentEmbedder>,
    index: Arc<dyn VectorIndex>,
) -> Result<(), PipelineError> {
    let documents = source.load(entity_id).await?;
    let record = aggregator.aggregate(entity_id, class, &documents).await?;
    let (document, chunks) = embedder.embed(&record).await?;

    index
        .upsert(
            entity_id.as_str(),
            document.vector.clone(),
            document_metadata(&document, &record.metadata, class),
        )
        .await?;
    for chunk in &chunks {
        index
            .upsert(
                &format!("{entity_id}::chunk-{}", chunk.chunk_id),
                chunk.vector.clone(),
                chunk_metadata(entity_id, chunk, class),
            )
            .await?;
    }
    Ok(())
}

fn document_metadata(
    document: &DocumentEmbedding,
    record: &crate::aggregation::RecordMetadata,
    class: EntityClass,
) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("class".to_string(), MetadataValue::from(class.to_string()));
    metadata.insert("kind".to_string(), MetadataValue::from("document"));
    metadata.insert(
        "model".to_string(),
        MetadataValue::from(document.provenance.model.clone()),
    );
    metadata.insert(
        "enriched".to_string(),
        MetadataValue::from(document.provenance.contextual_enrichment),
    );
    if let Some(sector) = &record.sector {
        metadata.insert("sector".to_string(), MetadataValue::from(sector.clone()));
    }
    if let Some(jurisdiction) = &record.jurisdiction {
        metadata.insert(
            "jurisdiction".to_string(),
            MetadataValue::from(jurisdiction.clone()),
        );
    }
    if let Some(effective) = record.effective_date {
        metadata.insert(
            "effective_date".to_string(),
            MetadataValue::from(effective.to_string()),
        );
    }
    metadata
}

fn chunk_metadata(entity_id: &EntityId, chunk: &ChunkEmbedding, class: EntityClass) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("class".to_string(), MetadataValue::from(class.to_string()));
    metadata.insert("kind".to_string(), MetadataValue::from("chunk"));
    metadata.insert(
        "parent".to_string(),
        MetadataValue::from(entity_id.to_string()),
    );
    metadata.insert(
        "section".to_string(),
        MetadataValue::from(chunk.section.encode()),
    );
    metadata
}
