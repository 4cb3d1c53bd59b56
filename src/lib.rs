//! Lexrisk: a regulatory-risk pipeline for structured filings and legislation.
//!
//! The crate consolidates per-entity document sets into a single record,
//! converts the consolidated text into fixed-dimension vectors, pushes those
//! vectors into a similarity index, and scores companies against indexed
//! regulations with an explainable weighted formula. A checkpointed batch
//! orchestrator drives the whole sequence across large entity sets with
//! retry, partial-failure isolation, and resume.
//!
//! # Pipeline
//!
//! ```text
//! DocumentSource ──► Aggregator ──► DocumentEmbedder ──► VectorIndex
//!                        │                                    │
//!                        └────────── BatchOrchestrator ───────┘
//!                                                             │
//!                                         RiskScorer ◄────────┘  (on demand)
//! ```
//!
//! # Module Map
//!
//! - [`types`]: entity identifiers, section kinds, relationship predicates
//! - [`documents`]: structured input documents and the [`documents::DocumentSource`] seam
//! - [`aggregation`]: per-entity consolidation, dedup, relationship graph
//! - [`embedding`]: chunking strategies and embedding providers
//! - [`index`]: the narrow vector-index client contract and implementations
//! - [`scoring`]: composite risk scores and recommendations
//! - [`batch`]: checkpointed, resumable batch execution
//! - [`config`]: pipeline configuration with environment resolution
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use lexrisk::aggregation::EntityAggregator;
//! use lexrisk::batch::{BatchOrchestrator, FsCheckpointStore};
//! use lexrisk::config::PipelineConfig;
//! use lexrisk::embedding::{DocumentEmbedder, HashEmbedder};
//! use lexrisk::index::InMemoryVectorIndex;
//! use std::sync::Arc;
//!
//! # async fn run() -> miette::Result<()> {
//! let config = PipelineConfig::default();
//! let embedder = DocumentEmbedder::new(Arc::new(HashEmbedder::new(384)), config.embedding.clone());
//! let index = Arc::new(InMemoryVectorIndex::new(384));
//! let checkpoints = FsCheckpointStore::new("checkpoint.json");
//! # Ok(())
//! # }
//! ```

pub mod aggregation;
pub mod batch;
pub mod config;
pub mod documents;
pub mod embedding;
pub mod errors;
pub mod index;
pub mod scoring;
pub mod types;
