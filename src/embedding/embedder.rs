//! Embedding providers.
//!
//! [`HttpEmbedder`] talks to an OpenAI-compatible embeddings endpoint.
//! [`HashEmbedder`] is a deterministic offline provider used in tests and
//! dry runs; texts sharing tokens produce nearby vectors, which is enough to
//! exercise similarity math without a model.

use async_trait::async_trait;
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use tracing::debug;

use crate::errors::PipelineError;

/// One text in, one fixed-dimension vector out.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError>;

    /// Vector dimension this provider produces.
    fn dimension(&self) -> usize;
}

/// Deterministic token-hash embedder.
///
/// Each whitespace token is hashed; the hash picks a component and a sign.
/// The result is L2-normalized so cosine similarity behaves sensibly.
#[derive(Clone, Debug)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text.split_whitespace() {
            let mut hasher = FxHasher::default();
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dimension as u64) as usize;
            let sign = if h & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[idx] += sign;
        }
        let norm = vector.iter().map(|c| c * c).sum::<f32>().sqrt();
        if norm > 0.0 {
            for component in &mut vector {
                *component /= norm;
            }
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Request timeout; a stalled backend surfaces as a retryable error instead
/// of hanging the entity.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Client for an OpenAI-compatible `/embeddings` endpoint.
#[derive(Clone, Debug)]
pub struct HttpEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
    ) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| PipelineError::Config(format!("embedding http client: {err}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            dimension,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await
            .map_err(|err| PipelineError::EmbeddingBackend {
                reason: err.to_string(),
                retryable: true,
            })?;

        let status = response.status();
        if !status.is_success() {
            // Rate limits and server errors are worth retrying; anything
            // else means the request itself is bad.
            let retryable = status.is_server_error() || status.as_u16() == 429;
            let body = response.text().await.unwrap_or_default();
            debug!(%status, retryable, "embedding backend rejected request");
            return Err(PipelineError::EmbeddingBackend {
                reason: format!("{status}: {body}"),
                retryable,
            });
        }

        let parsed: EmbeddingResponse =
            response
                .json()
                .await
                .map_err(|err| PipelineError::EmbeddingBackend {
                    reason: format!("unparseable embedding response: {err}"),
                    retryable: false,
                })?;
        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| PipelineError::EmbeddingBackend {
                reason: "embedding response contained no vectors".to_string(),
                retryable: false,
            })?;
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
