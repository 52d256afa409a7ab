//! OpenAI-compatible HTTP embedding provider.
//!
//! Sends `POST {endpoint}` with `{"model": ..., "input": [...]}` and reads
//! `data[].embedding` back, ordered by `data[].index`. Works with OpenAI,
//! Azure OpenAI deployments, Ollama's `/v1/embeddings`, and other servers
//! speaking the same shape.
//!
//! Each call is bounded by a global timeout covering connect, send, and
//! read. Failures are not retried.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::{check_provider_output, ensure_embeddable, EmbeddingService};
use crate::error::{IndexError, Result};
use crate::types::Embedding;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Embedding client for an OpenAI-compatible endpoint.
pub struct HttpEmbedding {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
    agent: ureq::Agent,
}

impl HttpEmbedding {
    /// Creates a client. `timeout` bounds each request end to end.
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
            dimension,
            agent,
        }
    }

    /// Sets the bearer token sent with every request.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Model name sent with each request.
    pub fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, texts), fields(model = %self.model, count = texts.len()))]
    fn request(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let body = serde_json::to_string(&EmbeddingRequest {
            model: &self.model,
            input: texts,
        })
        .map_err(|e| IndexError::embedding(format!("Failed to encode request: {e}")))?;

        let mut request = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let text = request
            .send(&body)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| {
                warn!(error = %e, "Embedding request failed");
                IndexError::embedding(format!("Request to {} failed: {e}", self.endpoint))
            })?;

        let mut response: EmbeddingResponse = serde_json::from_str(&text)
            .map_err(|e| IndexError::embedding(format!("Malformed embedding response: {e}")))?;

        if response.data.len() != texts.len() {
            return Err(IndexError::embedding(format!(
                "provider returned {} embeddings for {} inputs",
                response.data.len(),
                texts.len()
            )));
        }

        response.data.sort_by_key(|d| d.index);
        let embeddings: Vec<Embedding> = response.data.into_iter().map(|d| d.embedding).collect();
        for embedding in &embeddings {
            check_provider_output(embedding, self.dimension)?;
        }

        debug!("Embeddings received");
        Ok(embeddings)
    }
}

impl std::fmt::Debug for HttpEmbedding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbedding")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl EmbeddingService for HttpEmbedding {
    fn embed(&self, text: &str) -> Result<Embedding> {
        ensure_embeddable(text)?;
        let mut embeddings = self.request(&[text])?;
        embeddings
            .pop()
            .ok_or_else(|| IndexError::embedding("provider returned no embedding"))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        for text in texts {
            ensure_embeddable(text)?;
        }
        self.request(texts)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
