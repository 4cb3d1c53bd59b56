//! Error taxonomy for the pipeline.
//!
//! Every fallible operation in the crate returns [`PipelineError`]. The
//! orchestrator never branches on error *messages*; it branches on
//! [`PipelineError::class`], which folds the taxonomy into three behaviors:
//! retry, record-and-continue, or abort the run.

use miette::Diagnostic;
use thiserror::Error;

/// How the batch layer must react to an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Input problem scoped to one entity. Never retried; the entity is
    /// recorded as failed and the run continues.
    Fatal,
    /// Transient backend problem (timeout, rate limit, 5xx). Retried with
    /// backoff up to the configured cap.
    Transient,
    /// Misconfiguration affecting every entity (dimension mismatch, corrupt
    /// checkpoint). Aborts the whole run.
    Systemic,
}

#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error("malformed document {document_id} for entity {entity_id}: {reason}")]
    #[diagnostic(
        code(lexrisk::aggregation::malformed_document),
        help("Check the upstream parser output for this document id.")
    )]
    MalformedDocument {
        entity_id: String,
        document_id: String,
        reason: String,
    },

    #[error("no documents found for entity {entity_id}")]
    #[diagnostic(code(lexrisk::documents::entity_not_found))]
    EntityNotFound { entity_id: String },

    #[error("embedding backend failure: {reason}")]
    #[diagnostic(code(lexrisk::embedding::backend))]
    EmbeddingBackend { reason: String, retryable: bool },

    #[error("vector index failure: {reason}")]
    #[diagnostic(code(lexrisk::index::backend))]
    IndexBackend { reason: String, retryable: bool },

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    #[diagnostic(
        code(lexrisk::index::dimension_mismatch),
        help("The embedding model and the index disagree on dimensionality. Re-check LEXRISK_EMBED_DIM and the model configured for this index; mixing models invalidates every stored vector.")
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("checkpoint at {path} is unreadable: {reason}")]
    #[diagnostic(
        code(lexrisk::batch::checkpoint_corrupt),
        help("Refusing to guess resume state. Re-run with resume disabled to start fresh, or restore the checkpoint from a backup.")
    )]
    CheckpointCorrupt { path: String, reason: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(lexrisk::config::invalid))]
    Config(String),

    #[error("serialization error: {0}")]
    #[diagnostic(code(lexrisk::serde))]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    #[diagnostic(code(lexrisk::io))]
    Io(#[from] std::io::Error),

    #[error("batch task join error: {0}")]
    #[diagnostic(code(lexrisk::batch::join))]
    Join(#[from] tokio::task::JoinError),
}

impl PipelineError {
    /// Classify this error for the orchestrator's per-entity state machine.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MalformedDocument { .. } | Self::EntityNotFound { .. } => ErrorClass::Fatal,
            Self::EmbeddingBackend { retryable, .. } | Self::IndexBackend { retryable, .. } => {
                if *retryable {
                    ErrorClass::Transient
                } else {
                    ErrorClass::Fatal
                }
            }
            Self::DimensionMismatch { .. }
            | Self::CheckpointCorrupt { .. }
            | Self::Config(_) => ErrorClass::Systemic,
            // Io errors surface from local reads/writes mid-pipeline and are
            // worth one more pass before giving up on the entity.
            Self::Io(_) => ErrorClass::Transient,
            Self::Serde(_) => ErrorClass::Fatal,
            Self::Join(_) => ErrorClass::Systemic,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    #[must_use]
    pub fn is_systemic(&self) -> bool {
        self.class() == ErrorClass::Systemic
    }
}
