//! Abstractive summarization for ingested documents.
//!
//! The adapter mirrors the embedding module: it talks to the configured chat provider over
//! HTTP and never raises to callers. A failed or empty summarization yields `""`, which the
//! ingestion pipeline treats as "fall back to a text prefix" when embedding the summary.

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

const SYSTEM_PROMPT: &str =
    "Summarize in 5 concise bullet points with key findings and organism/context.";

/// Errors raised internally by summarization providers.
#[derive(Debug, Error)]
pub enum SummarizationError {
    /// Provider was unreachable before a response arrived.
    #[error("Summarization provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate summary: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by summarization backends.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Produce a short natural-language summary of the text. Never fails; degraded calls
    /// return an empty string.
    async fn summarize(&self, text: &str) -> String;
}

/// HTTP-backed chat adapter for Ollama and OpenAI.
pub struct HttpSummarizer {
    pub(crate) http: Client,
    pub(crate) provider: Provider,
    pub(crate) base_url: String,
    pub(crate) model: String,
    pub(crate) api_key: Option<String>,
}

impl HttpSummarizer {
    /// Construct an adapter from the process configuration.
    pub fn from_config() -> Self {
        let config = get_config();
        let base_url = match config.chat_provider {
            Provider::Ollama => config
                .ollama_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            Provider::OpenAI => OPENAI_BASE_URL.to_string(),
        };
        let http = Client::builder()
            .user_agent("spacebio/summary")
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to construct reqwest::Client for summarization");

        Self {
            http,
            provider: config.chat_provider,
            base_url,
            model: config.chat_model.clone(),
            api_key: config.openai_api_key.clone(),
        }
    }

    async fn try_summarize(&self, text: &str) -> Result<String, SummarizationError> {
        match self.provider {
            Provider::Ollama => self.summarize_ollama(text).await,
            Provider::OpenAI => self.summarize_openai(text).await,
        }
    }

    async fn summarize_ollama(&self, text: &str) -> Result<String, SummarizationError> {
        let endpoint = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let payload = json!({
            "model": self.model,
            "stream": false,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": text },
            ],
        });

        let response = self
            .http
            .post(&endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                SummarizationError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizationError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaChatResponse = response.json().await.map_err(|error| {
            SummarizationError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;
        Ok(body.message.content.trim().to_string())
    }

    async fn summarize_openai(&self, text: &str) -> Result<String, SummarizationError> {
        let endpoint = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            SummarizationError::GenerationFailed("OPENAI_API_KEY is not configured".to_string())
        })?;
        let payload = json!({
            "model": self.model,
            "temperature": 0.2,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": text },
            ],
        });

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                SummarizationError::ProviderUnavailable(format!(
                    "failed to reach OpenAI at {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizationError::GenerationFailed(format!(
                "OpenAI returned {status}: {body}"
            )));
        }

        let body: OpenAiChatResponse = response.json().await.map_err(|error| {
            SummarizationError::InvalidResponse(format!(
                "failed to decode OpenAI response: {error}"
            ))
        })?;
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| {
                SummarizationError::InvalidResponse("OpenAI response contained no choices".into())
            })
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, text: &str) -> String {
        match self.try_summarize(text).await {
            Ok(summary) => summary,
            Err(error) => {
                tracing::warn!(
                    provider = ?self.provider,
                    model = %self.model,
                    error = %error,
                    "Summarization degraded to empty string"
                );
                String::new()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaChatMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChatChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatChoice {
    message: OpenAiChatMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn test_summarizer(provider: Provider, base_url: String) -> HttpSummarizer {
        HttpSummarizer {
            http: Client::builder()
                .user_agent("spacebio-test")
                .build()
                .expect("client"),
            provider,
            base_url,
            model: "test-chat".into(),
            api_key: Some("sk-test".into()),
        }
    }

    #[tokio::test]
    async fn ollama_chat_returns_trimmed_summary() {
        let server = MockServer::start_async().await;
        let summarizer = test_summarizer(Provider::Ollama, server.base_url());

        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat");
                then.status(200).json_body(json!({
                    "message": { "role": "assistant", "content": "  - finding one\n" },
                    "done": true
                }));
            })
            .await;

        let summary = summarizer.summarize("Plants grown aboard the ISS...").await;
        mock.assert();
        assert_eq!(summary, "- finding one");
    }

    #[tokio::test]
    async fn provider_failure_degrades_to_empty_string() {
        let server = MockServer::start_async().await;
        let summarizer = test_summarizer(Provider::Ollama, server.base_url());

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat");
                then.status(503).body("overloaded");
            })
            .await;

        let summary = summarizer.summarize("anything").await;
        assert_eq!(summary, "");
    }

    #[tokio::test]
    async fn openai_chat_reads_first_choice() {
        let server = MockServer::start_async().await;
        let summarizer = test_summarizer(Provider::OpenAI, server.base_url());

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer sk-test");
                then.status(200).json_body(json!({
                    "choices": [
                        { "message": { "role": "assistant", "content": "Five bullets." } }
                    ]
                }));
            })
            .await;

        let summary = summarizer.summarize("Radiation effects on C. elegans").await;
        mock.assert();
        assert_eq!(summary, "Five bullets.");
    }
}
