//! Embedding provider capability.
//!
//! `embed` is deterministic for a fixed (text, model) pair, which is what
//! makes memoization in [`crate::providers::embedding_cache`] sound.

use serde::Deserialize;

use crate::error::ProviderError;

/// Capability: turn text into a fixed-dimension vector.
pub trait Embedder: Send + Sync {
    /// Embed one text. Fails with [`ProviderError::Unavailable`] on
    /// transport/auth/timeout problems; never silently defaults.
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Output dimension, constant for the lifetime of the embedder.
    fn dimension(&self) -> usize;

    /// Model identifier, part of the memoization key contract.
    fn model_id(&self) -> &str;
}

/// OpenAI-compatible `/v1/embeddings` client.
pub struct HttpEmbedder {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        dimension: usize,
        timeout: std::time::Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("http client init: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            dimension,
        })
    }
}

impl Embedder for HttpEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "model": self.model, "input": text }))
            .send()
            .map_err(|e| ProviderError::Unavailable(format!("embeddings request: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!(
                "embeddings request returned {status}"
            )));
        }

        let body: EmbeddingsResponse = resp
            .json()
            .map_err(|e| ProviderError::MalformedResponse(format!("embeddings body: {e}")))?;
        let vector = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| {
                ProviderError::MalformedResponse("embeddings response had no data".to_string())
            })?;

        if vector.len() != self.dimension {
            return Err(ProviderError::MalformedResponse(format!(
                "expected {} dims, provider returned {}",
                self.dimension,
                vector.len()
            )));
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
