//! Embedding generation for documents, summaries, and queries.
//!
//! The adapter issues HTTP requests directly to the configured provider (Ollama or OpenAI)
//! and never raises to its callers: any failure degrades to a zero vector of the configured
//! dimension so ingestion and search keep moving. Both stores compare vectors in the same
//! cosine metric space, which is why every vector passes through [`normalize_dimension`]
//! before leaving this module.

use crate::config::{Provider, get_config};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const OPENAI_BASE_URL: &str = "https://api.openai.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Force a vector to exactly `dimension` components.
///
/// Longer vectors keep their leading components; shorter vectors are zero-padded on the
/// right. Idempotent and infallible, so mixed-dimension models cannot poison either index.
pub fn normalize_dimension(mut vector: Vec<f32>, dimension: usize) -> Vec<f32> {
    vector.truncate(dimension);
    vector.resize(dimension, 0.0);
    vector
}

/// Errors raised internally by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Provider was unreachable before a response arrived.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate embedding: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Result of one embedding attempt, including degradation provenance.
///
/// Callers outside this module only ever see the vector; the `degraded` reason exists so
/// the adapter can log why a zero vector was substituted without breaking the
/// never-blocks-the-pipeline contract.
#[derive(Debug, Clone)]
pub struct EmbeddingOutcome {
    /// Normalized vector of the configured dimension.
    pub vector: Vec<f32>,
    /// Failure description when the provider call was degraded to a zero vector.
    pub degraded: Option<String>,
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Produce a vector for the supplied text. Never fails; degraded calls return a zero
    /// vector of the configured dimension.
    async fn embed(&self, text: &str) -> Vec<f32>;
}

/// HTTP-backed embedding adapter for Ollama and OpenAI.
pub struct HttpEmbedder {
    pub(crate) http: Client,
    pub(crate) provider: Provider,
    pub(crate) base_url: String,
    pub(crate) model: String,
    pub(crate) api_key: Option<String>,
    pub(crate) dimension: usize,
}

impl HttpEmbedder {
    /// Construct an adapter from the process configuration.
    pub fn from_config() -> Self {
        let config = get_config();
        let base_url = match config.embedding_provider {
            Provider::Ollama => config
                .ollama_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            Provider::OpenAI => OPENAI_BASE_URL.to_string(),
        };
        let http = Client::builder()
            .user_agent("spacebio/0.2")
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to construct reqwest::Client for embeddings");

        Self {
            http,
            provider: config.embedding_provider,
            base_url,
            model: config.embedding_model.clone(),
            api_key: config.openai_api_key.clone(),
            dimension: config.embedding_dimension,
        }
    }

    /// Embed text, reporting whether the provider call was degraded.
    pub async fn embed_outcome(&self, text: &str) -> EmbeddingOutcome {
        match self.try_embed(text).await {
            Ok(vector) => EmbeddingOutcome {
                vector: normalize_dimension(vector, self.dimension),
                degraded: None,
            },
            Err(error) => EmbeddingOutcome {
                vector: vec![0.0; self.dimension],
                degraded: Some(error.to_string()),
            },
        }
    }

    async fn try_embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        match self.provider {
            Provider::Ollama => self.embed_ollama(text).await,
            Provider::OpenAI => self.embed_openai(text).await,
        }
    }

    async fn embed_ollama(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let endpoint = format!("{}/api/embeddings", self.base_url.trim_end_matches('/'));
        let payload = json!({
            "model": self.model,
            "prompt": text,
        });

        let response = self
            .http
            .post(&endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                EmbeddingError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaEmbeddingResponse = response.json().await.map_err(|error| {
            EmbeddingError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;
        Ok(body.embedding)
    }

    async fn embed_openai(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let endpoint = format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'));
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            EmbeddingError::GenerationFailed("OPENAI_API_KEY is not configured".to_string())
        })?;
        let payload = json!({
            "model": self.model,
            "input": text,
        });

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                EmbeddingError::ProviderUnavailable(format!(
                    "failed to reach OpenAI at {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::GenerationFailed(format!(
                "OpenAI returned {status}: {body}"
            )));
        }

        let body: OpenAiEmbeddingResponse = response.json().await.map_err(|error| {
            EmbeddingError::InvalidResponse(format!("failed to decode OpenAI response: {error}"))
        })?;
        body.data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .ok_or_else(|| {
                EmbeddingError::InvalidResponse("OpenAI response contained no embeddings".into())
            })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Vec<f32> {
        let outcome = self.embed_outcome(text).await;
        if let Some(reason) = &outcome.degraded {
            tracing::warn!(
                provider = ?self.provider,
                model = %self.model,
                reason,
                "Embedding degraded to zero vector"
            );
        }
        outcome.vector
    }
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingEntry>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingEntry {
    embedding: Vec<f32>,
}
