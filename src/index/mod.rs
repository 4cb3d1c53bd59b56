//! The narrow vector-index client contract.
//!
//! The similarity backend is an external collaborator; this crate only
//! defines how it is used: idempotent upserts keyed by entity id and
//! cosine-ranked queries with conjunctive exact-match metadata filters.
//! Writes are at-least-once and reads are eventually consistent, so callers
//! must not assume a query reflects the immediately preceding upsert.

pub mod http;
pub mod memory;

pub use http::HttpVectorIndex;
pub use memory::InMemoryVectorIndex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::PipelineError;

/// Scalar metadata attached to an indexed vector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Conjunctive exact-match constraints applied before ranking.
pub type MetadataFilter = BTreeMap<String, MetadataValue>;

/// Vector metadata map.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// One ranked query result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexMatch {
    pub id: String,
    /// Cosine similarity in [-1, 1]; higher is closer.
    pub score: f32,
    pub metadata: Metadata,
}

/// Narrow client contract over a similarity-search backend.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the vector stored under `id`. Re-upserting the same
    /// id replaces, never duplicates. A vector whose length differs from
    /// [`dimension`](Self::dimension) is rejected as a systemic error.
    async fn upsert(
        &self,
        id: &str,
        vector: Vec<f32>,
        metadata: Metadata,
    ) -> Result<(), PipelineError>;

    /// Top-`k` most similar vectors under cosine, restricted to entries
    /// matching every filter constraint.
    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexMatch>, PipelineError>;

    /// Fixed vector dimension for the lifetime of this index.
    fn dimension(&self) -> usize;
}

/// Cosine similarity of two equal-length vectors; 0 when either is zero.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

pub(crate) fn check_dimension(expected: usize, actual: usize) -> Result<(), PipelineError> {
    if expected != actual {
        return Err(PipelineError::DimensionMismatch { expected, actual });
    }
    Ok(())
}
