//! Chunking and embedding of consolidated records.
//!
//! A consolidated record is split into bounded chunks, each chunk becomes one
//! fixed-dimension vector, and the document-level vector is the element-wise
//! arithmetic mean of the chunk vectors. Chunking configuration and
//! enrichment state travel with every vector as [`EmbeddingProvenance`] so an
//! index never silently mixes incompatible embeddings.

pub mod chunker;
pub mod embedder;

pub use chunker::{Chunk, Chunker};
pub use embedder::{Embedder, HashEmbedder, HttpEmbedder};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::aggregation::ConsolidatedRecord;
use crate::batch::retry::retry_with_backoff;
use crate::config::{ChunkStrategy, EmbeddingConfig, RetryConfig};
use crate::errors::PipelineError;
use crate::types::{EntityId, SectionKind};

/// Identifies the exact configuration that produced a vector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingProvenance {
    pub model: String,
    pub dimension: usize,
    pub chunking: ChunkStrategy,
    pub contextual_enrichment: bool,
}

impl From<&EmbeddingConfig> for EmbeddingProvenance {
    fn from(config: &EmbeddingConfig) -> Self {
        Self {
            model: config.model.clone(),
            dimension: config.dimension,
            chunking: config.chunking.clone(),
            contextual_enrichment: config.contextual_enrichment,
        }
    }
}

/// One chunk's vector with its position and provenance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkEmbedding {
    /// Sequence index within the document.
    pub chunk_id: usize,
    pub text: String,
    pub vector: Vec<f32>,
    pub section: SectionKind,
    pub source_document_id: String,
}

/// One mean-pooled vector for an entire entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentEmbedding {
    pub entity_id: EntityId,
    pub vector: Vec<f32>,
    pub provenance: EmbeddingProvenance,
}

/// Element-wise arithmetic mean of chunk vectors.
///
/// Order-independent and well-defined for a single vector. Returns `None`
/// for an empty slice.
#[must_use]
pub fn mean_pool(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    let mut pooled = vec![0.0f32; first.len()];
    for vector in vectors {
        for (acc, component) in pooled.iter_mut().zip(vector) {
            *acc += component;
        }
    }
    let n = vectors.len() as f32;
    for component in &mut pooled {
        *component /= n;
    }
    Some(pooled)
}

/// Turns a consolidated record into chunk vectors plus one document vector.
///
/// Transient backend failures are retried with backoff; a chunk that still
/// fails is dropped with a warning rather than replaced with a zero vector.
/// A vector of the wrong dimension aborts immediately since it signals a
/// model/index mismatch, not a per-chunk problem.
pub struct DocumentEmbedder {
    embedder: Arc<dyn Embedder>,
    config: EmbeddingConfig,
    retry: RetryConfig,
}

impl DocumentEmbedder {
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>, config: EmbeddingConfig) -> Self {
        Self {
            embedder,
            config,
            retry: RetryConfig::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn provenance(&self) -> EmbeddingProvenance {
        EmbeddingProvenance::from(&self.config)
    }

    /// Embed every chunk of `record` and pool the document vector.
    #[instrument(skip(self, record), fields(entity_id = %record.entity_id), err)]
    pub async fn embed(
        &self,
        record: &ConsolidatedRecord,
    ) -> Result<(DocumentEmbedding, Vec<ChunkEmbedding>), PipelineError> {
        let chunker = Chunker::new(self.config.chunking.clone());
        let chunks = chunker.chunk_record(record);
        if chunks.is_empty() {
            return Err(PipelineError::MalformedDocument {
                entity_id: record.entity_id.to_string(),
                document_id: "<consolidated>".to_string(),
                reason: "record has no text to embed".to_string(),
            });
        }

        let prefix = self.enrichment_prefix(record);
        let mut embedded = Vec::with_capacity(chunks.len());
        for (chunk_id, chunk) in chunks.into_iter().enumerate() {
            let input = match &prefix {
                Some(p) => format!("{p} {}", chunk.text),
                None => chunk.text.clone(),
            };
            let embedder = Arc::clone(&self.embedder);
            let result =
                retry_with_backoff(&self.retry, || {
                    let embedder = Arc::clone(&embedder);
                    let input = input.clone();
                    async move { embedder.embed(&input).await }
                })
                .await;
            match result {
                Ok(vector) => {
                    if vector.len() != self.config.dimension {
                        return Err(PipelineError::DimensionMismatch {
                            expected: self.config.dimension,
                            actual: vector.len(),
                        });
                    }
                    embedded.push(ChunkEmbedding {
                        chunk_id,
                        text: chunk.text,
                        vector,
                        section: chunk.section,
                        source_document_id: chunk.source_document_id,
                    });
                }
                Err(err) if err.is_systemic() => return Err(err),
                Err(err) => {
                    warn!(
                        entity_id = %record.entity_id,
                        chunk_id,
                        error = %err,
                        "dropping chunk after exhausted retries"
                    );
                }
            }
        }

        let vectors: Vec<Vec<f32>> = embedded.iter().map(|c| c.vector.clone()).collect();
        let Some(pooled) = mean_pool(&vectors) else {
            return Err(PipelineError::EmbeddingBackend {
                reason: format!("all chunks failed for entity {}", record.entity_id),
                retryable: false,
            });
        };

        Ok((
            DocumentEmbedding {
                entity_id: record.entity_id.clone(),
                vector: pooled,
                provenance: self.provenance(),
            },
            embedded,
        ))
    }

    fn enrichment_prefix(&self, record: &ConsolidatedRecord) -> Option<String> {
        if !self.config.contextual_enrichment {
            return None;
        }
        let sector = record.metadata.sector.as_deref().unwrap_or("unknown");
        let jurisdiction = record.metadata.jurisdiction.as_deref().unwrap_or("unknown");
        Some(format!(
            "Sector: {sector}. Jurisdiction: {jurisdiction}."
        ))
    }
}
