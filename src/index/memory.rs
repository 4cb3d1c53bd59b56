//! In-process vector index.
//!
//! Reference implementation of the client contract, used by tests and
//! single-machine runs. Exact cosine over a hash map; fine for thousands of
//! vectors, not meant as an ANN engine.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::errors::PipelineError;
use crate::index::{check_dimension, cosine_similarity, IndexMatch, Metadata, MetadataFilter, VectorIndex};

#[derive(Clone, Debug)]
struct StoredVector {
    vector: Vec<f32>,
    metadata: Metadata,
}

/// Exact-search in-memory index with a fixed dimension.
#[derive(Clone, Debug)]
pub struct InMemoryVectorIndex {
    dimension: usize,
    entries: Arc<RwLock<FxHashMap<String, StoredVector>>>,
}

impl InMemoryVectorIndex {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Arc::new(RwLock::new(FxHashMap::default())),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn matches_filter(metadata: &Metadata, filter: Option<&MetadataFilter>) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    filter
        .iter()
        .all(|(key, expected)| metadata.get(key) == Some(expected))
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(
        &self,
        id: &str,
        vector: Vec<f32>,
        metadata: Metadata,
    ) -> Result<(), PipelineError> {
        check_dimension(self.dimension, vector.len())?;
        let mut entries = self.entries.write().await;
        entries.insert(id.to_string(), StoredVector { vector, metadata });
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexMatch>, PipelineError> {
        check_dimension(self.dimension, vector.len())?;
        let entries = self.entries.read().await;
        let mut matches: Vec<IndexMatch> = entries
            .iter()
            .filter(|(_, stored)| matches_filter(&stored.metadata, filter))
            .map(|(id, stored)| IndexMatch {
                id: id.clone(),
                score: cosine_similarity(vector, &stored.vector),
                metadata: stored.metadata.clone(),
            })
            .collect();
        // Descending by score, id as a deterministic tie-break.
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(k);
        Ok(matches)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MetadataValue;
    use std::collections::BTreeMap;

    fn meta(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), MetadataValue::from(*v)))
            .collect()
    }

    #[tokio::test]
    async fn upsert_replaces_never_duplicates() {
        let index = InMemoryVectorIndex::new(2);
        index
            .upsert("reg-1", vec![1.0, 0.0], meta(&[("class", "regulation")]))
            .await
            .unwrap();
        index
            .upsert("reg-1", vec![0.0, 1.0], meta(&[("class", "regulation")]))
            .await
            .unwrap();
        assert_eq!(index.len().await, 1);
        let matches = index.query(&[0.0, 1.0], 10, None).await.unwrap();
        assert!((matches[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn query_ranks_by_cosine_and_respects_k() {
        let index = InMemoryVectorIndex::new(2);
        index.upsert("a", vec![1.0, 0.0], meta(&[])).await.unwrap();
        index.upsert("b", vec![0.7, 0.7], meta(&[])).await.unwrap();
        index.upsert("c", vec![0.0, 1.0], meta(&[])).await.unwrap();
        let matches = index.query(&[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "a");
        assert_eq!(matches[1].id, "b");
    }

    #[tokio::test]
    async fn filter_is_conjunctive_exact_match() {
        let index = InMemoryVectorIndex::new(2);
        index
            .upsert(
                "a",
                vec![1.0, 0.0],
                meta(&[("class", "regulation"), ("sector", "Technology")]),
            )
            .await
            .unwrap();
        index
            .upsert(
                "b",
                vec![1.0, 0.0],
                meta(&[("class", "regulation"), ("sector", "Energy")]),
            )
            .await
            .unwrap();
        let mut filter = BTreeMap::new();
        filter.insert("class".to_string(), MetadataValue::from("regulation"));
        filter.insert("sector".to_string(), MetadataValue::from("Technology"));
        let matches = index.query(&[1.0, 0.0], 10, Some(&filter)).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "a");
    }

    #[tokio::test]
    async fn wrong_dimension_is_rejected_on_both_paths() {
        let index = InMemoryVectorIndex::new(3);
        let err = index.upsert("a", vec![1.0], meta(&[])).await.unwrap_err();
        assert!(err.is_systemic());
        let err = index.query(&[1.0], 5, None).await.unwrap_err();
        assert!(err.is_systemic());
    }
}
