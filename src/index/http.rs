//! HTTP client for a remote vector-index service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::PipelineError;
use crate::index::{check_dimension, IndexMatch, Metadata, MetadataFilter, VectorIndex};

#[derive(Serialize)]
struct UpsertRequest<'a> {
    id: &'a str,
    vector: &'a [f32],
    metadata: &'a Metadata,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    vector: &'a [f32],
    k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a MetadataFilter>,
}

#[derive(Deserialize)]
struct QueryResponse {
    matches: Vec<IndexMatch>,
}

/// Client for a service exposing `POST /vectors` and `POST /query`.
///
/// The service owns durability and consistency; this client only enforces
/// the dimension invariant before anything leaves the process.
#[derive(Clone, Debug)]
pub struct HttpVectorIndex {
    client: reqwest::Client,
    base_url: String,
    dimension: usize,
}

/// Request timeout; a stalled service surfaces as a retryable error instead
/// of hanging the entity.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

impl HttpVectorIndex {
    pub fn new(base_url: impl Into<String>, dimension: usize) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| PipelineError::Config(format!("index http client: {err}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            dimension,
        })
    }

    fn classify(status: reqwest::StatusCode) -> bool {
        status.is_server_error() || status.as_u16() == 429
    }
}

#[async_trait]
impl VectorIndex for HttpVectorIndex {
    async fn upsert(
        &self,
        id: &str,
        vector: Vec<f32>,
        metadata: Metadata,
    ) -> Result<(), PipelineError> {
        check_dimension(self.dimension, vector.len())?;
        let url = format!("{}/vectors", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&UpsertRequest {
                id,
                vector: &vector,
                metadata: &metadata,
            })
            .send()
            .await
            .map_err(|err| PipelineError::IndexBackend {
                reason: err.to_string(),
                retryable: true,
            })?;
        let status = response.status();
        if !status.is_success() {
            let retryable = Self::classify(status);
            let body = response.text().await.unwrap_or_default();
            debug!(%status, retryable, id, "index upsert rejected");
            return Err(PipelineError::IndexBackend {
                reason: format!("{status}: {body}"),
                retryable,
            });
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexMatch>, PipelineError> {
        check_dimension(self.dimension, vector.len())?;
        let url = format!("{}/query", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&QueryRequest { vector, k, filter })
            .send()
            .await
            .map_err(|err| PipelineError::IndexBackend {
                reason: err.to_string(),
                retryable: true,
            })?;
        let status = response.status();
        if !status.is_success() {
            let retryable = Self::classify(status);
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::IndexBackend {
                reason: format!("{status}: {body}"),
                retryable,
            });
        }
        let parsed: QueryResponse =
            response
                .json()
                .await
                .map_err(|err| PipelineError::IndexBackend {
                    reason: format!("unparseable query response: {err}"),
                    retryable: false,
                })?;
        Ok(parsed.matches)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
