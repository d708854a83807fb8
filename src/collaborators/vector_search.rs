//! Raw vector-search collaborator.
//!
//! The actual index (embeddings, storage, ranking) lives in the external
//! vector-search service; this client only shapes the HTTP round trip.
//! [`crate::search`] (C5) is the thin adapter that hydrates these raw
//! hits into domain objects and applies the confidence/ambiguity
//! thresholds described in the spec.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct VectorHit {
    pub score: f64,
    /// Raw, index-specific payload (e.g. a stringified template or table row).
    pub payload: Value,
}

#[derive(Debug, Serialize)]
struct VectorSearchRequest<'a> {
    query: &'a str,
    top_k: usize,
}

#[derive(Debug, Deserialize)]
struct VectorSearchResponse {
    #[serde(default)]
    hits: Vec<VectorHit>,
}

#[async_trait]
pub trait VectorSearchClient: Send + Sync {
    async fn search(&self, index_url: &str, query: &str, top_k: usize) -> Result<Vec<VectorHit>, AppError>;
}

pub struct HttpVectorSearchClient {
    http_client: reqwest::Client,
}

impl HttpVectorSearchClient {
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpVectorSearchClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorSearchClient for HttpVectorSearchClient {
    async fn search(&self, index_url: &str, query: &str, top_k: usize) -> Result<Vec<VectorHit>, AppError> {
        let response = self
            .http_client
            .post(index_url)
            .json(&VectorSearchRequest { query, top_k })
            .send()
            .await
            .map_err(|e| AppError::Search(format!("request to {index_url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Search(format!("{index_url} returned {status}: {body}")));
        }

        let parsed: VectorSearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::Search(format!("failed to parse response from {index_url}: {e}")))?;

        Ok(parsed.hits)
    }
}
