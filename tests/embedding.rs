//! Embedding determinism and pooling properties.

mod common;

use std::sync::Arc;

use lexrisk::aggregation::EntityAggregator;
use lexrisk::config::ChunkStrategy;
use lexrisk::embedding::{mean_pool, DocumentEmbedder, HashEmbedder};
use lexrisk::types::{EntityClass, EntityId};
use proptest::prelude::*;

use common::{company_document, test_config, TEST_DIM};

#[tokio::test]
async fn two_embedders_with_the_same_configuration_agree() {
    let config = test_config().embedding;
    let aggregator = EntityAggregator::new();
    let docs = vec![company_document(
        "10-K",
        "2024-01-01",
        "Designs phones. Sells services. Operates stores. Builds chips.",
        "Tariffs may rise. Regulations may tighten.",
    )];
    let record = aggregator
        .aggregate(&EntityId::from("AAPL"), EntityClass::Company, &docs)
        .await
        .unwrap();

    let a = DocumentEmbedder::new(Arc::new(HashEmbedder::new(TEST_DIM)), config.clone());
    let b = DocumentEmbedder::new(Arc::new(HashEmbedder::new(TEST_DIM)), config);
    let (doc_a, chunks_a) = a.embed(&record).await.unwrap();
    let (doc_b, chunks_b) = b.embed(&record).await.unwrap();
    assert_eq!(doc_a.vector, doc_b.vector);
    assert_eq!(chunks_a, chunks_b);
    assert_eq!(doc_a.vector.len(), TEST_DIM);
}

#[tokio::test]
async fn chunking_strategy_is_recorded_in_provenance() {
    let mut config = test_config().embedding;
    config.chunking = ChunkStrategy::ParagraphBudget { max_tokens: 40 };
    let embedder = DocumentEmbedder::new(Arc::new(HashEmbedder::new(TEST_DIM)), config.clone());
    assert_eq!(embedder.provenance().chunking, config.chunking);
    assert_eq!(embedder.provenance().model, config.model);
}

proptest! {
    /// The document vector is invariant under chunk-vector permutation.
    #[test]
    fn mean_pool_is_order_independent(
        vectors in prop::collection::vec(
            prop::collection::vec(-10.0f32..10.0, 8),
            1..6,
        ),
        seed in any::<u64>(),
    ) {
        let pooled = mean_pool(&vectors).unwrap();
        let mut shuffled = vectors.clone();
        // Deterministic permutation from the seed.
        let len = shuffled.len();
        for i in (1..len).rev() {
            let j = (seed.wrapping_mul(i as u64 + 1) % (i as u64 + 1)) as usize;
            shuffled.swap(i, j);
        }
        let pooled_shuffled = mean_pool(&shuffled).unwrap();
        for (a, b) in pooled.iter().zip(&pooled_shuffled) {
            prop_assert!((a - b).abs() < 1e-4);
        }
    }

    /// Pooled components stay within the range spanned by the inputs.
    #[test]
    fn mean_pool_stays_within_component_bounds(
        vectors in prop::collection::vec(
            prop::collection::vec(-10.0f32..10.0, 4),
            1..6,
        ),
    ) {
        let pooled = mean_pool(&vectors).unwrap();
        for (i, component) in pooled.iter().enumerate() {
            let lo = vectors.iter().map(|v| v[i]).fold(f32::MAX, f32::min);
            let hi = vectors.iter().map(|v| v[i]).fold(f32::MIN, f32::max);
            prop_assert!(*component >= lo - 1e-4 && *component <= hi + 1e-4);
        }
    }
}
