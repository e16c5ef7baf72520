//! Shared types used by the summary index client.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors returned while interacting with Qdrant.
#[derive(Debug, Error)]
pub enum QdrantError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Qdrant URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Qdrant responded with an unexpected status code.
    #[error("Unexpected Qdrant response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Qdrant.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Summary point ready for upsert, keyed by the deterministic url hash.
#[derive(Debug, Clone)]
pub struct SummaryRecord {
    /// Point id derived from the document URL; stable across re-ingestion.
    pub id: u64,
    /// Summary embedding vector.
    pub vector: Vec<f32>,
    /// Source document URL.
    pub url: String,
    /// Display title.
    pub title: String,
    /// Natural-language summary (may be empty when summarization degraded).
    pub summary: String,
}

/// Scored summary returned by nearest-neighbor queries.
#[derive(Debug, Clone)]
pub struct SummaryHit {
    /// Source document URL.
    pub url: String,
    /// Display title.
    pub title: String,
    /// Stored summary text.
    pub summary: String,
    /// Native cosine similarity score (higher is better).
    pub score: f32,
}

impl SummaryHit {
    pub(crate) fn from_payload(score: f32, payload: Option<Map<String, Value>>) -> Self {
        let payload = payload.unwrap_or_default();
        let field = |key: &str| {
            payload
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            url: field("url"),
            title: field("title"),
            summary: field("summary"),
            score,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct QueryResponse {
    pub(crate) result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

#[derive(Deserialize)]
pub(crate) struct QueryPoint {
    pub(crate) score: f32,
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
}
