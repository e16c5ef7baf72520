//! Summary index backed by Qdrant's REST API.
//!
//! Each document contributes one point keyed by a deterministic 64-bit hash of its URL, so
//! re-ingestion replaces the point instead of duplicating it. The collection is created
//! lazily with cosine distance, matching the metric the document store reports.

mod types;

pub use types::{QdrantError, SummaryHit, SummaryRecord};

use crate::config::get_config;
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use types::{QueryResponse, QueryResponseResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Derive the stable point id for a document URL.
///
/// First eight bytes of SHA-256, interpreted big-endian. The 64-bit space keeps accidental
/// collisions across distinct URLs negligible while staying inside Qdrant's unsigned
/// integer id range.
pub fn point_id(url: &str) -> u64 {
    let digest = Sha256::digest(url.as_bytes());
    u64::from_be_bytes(digest[..8].try_into().expect("digest has at least 8 bytes"))
}

/// Interface to the summary nearest-neighbor index.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Create the backing collection if it does not exist yet. Idempotent.
    async fn ensure_collection(&self) -> Result<(), QdrantError>;

    /// Insert or replace one summary point.
    async fn upsert(&self, record: SummaryRecord) -> Result<(), QdrantError>;

    /// Rank stored summaries by similarity to `vector`, up to `limit` hits.
    async fn query(&self, vector: &[f32], limit: usize) -> Result<Vec<SummaryHit>, QdrantError>;
}

/// Lightweight HTTP client for the Qdrant summary collection.
pub struct SummaryIndex {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) collection: String,
    pub(crate) vector_size: u64,
}

impl SummaryIndex {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, QdrantError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("spacebio/0.2")
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let base_url = normalize_base_url(&config.qdrant_url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            collection = %config.qdrant_collection_name,
            has_api_key = %config
                .qdrant_api_key
                .as_deref()
                .map(|value| !value.is_empty())
                .unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: config.qdrant_api_key.clone(),
            collection: config.qdrant_collection_name.clone(),
            vector_size: config.embedding_dimension as u64,
        })
    }

    async fn collection_exists(&self) -> Result<bool, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{}", self.collection))?
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = %self.collection, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    async fn create_collection(&self) -> Result<(), QdrantError> {
        let body = json!({
            "vectors": {
                "size": self.vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{}", self.collection))?
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = %self.collection, "Collection created");
        })
        .await
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, QdrantError> {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        Ok(req)
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), QdrantError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl SummaryStore for SummaryIndex {
    async fn ensure_collection(&self) -> Result<(), QdrantError> {
        if self.collection_exists().await? {
            return Ok(());
        }
        tracing::debug!(
            collection = %self.collection,
            vector_size = self.vector_size,
            "Creating summary collection"
        );
        self.create_collection().await
    }

    async fn upsert(&self, record: SummaryRecord) -> Result<(), QdrantError> {
        let point = json!({
            "id": record.id,
            "vector": record.vector,
            "payload": {
                "url": record.url,
                "title": record.title,
                "summary": record.summary,
                "ingested_at": current_timestamp_rfc3339(),
            }
        });

        let response = self
            .request(
                Method::PUT,
                &format!("collections/{}/points", self.collection),
            )?
            .query(&[("wait", true)])
            .json(&json!({ "points": [point] }))
            .send()
            .await?;

        let id = record.id;
        self.ensure_success(response, || {
            tracing::debug!(collection = %self.collection, id, "Summary point upserted");
        })
        .await
    }

    async fn query(&self, vector: &[f32], limit: usize) -> Result<Vec<SummaryHit>, QdrantError> {
        let body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{}/points/query", self.collection),
            )?
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = %self.collection, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };
        Ok(points
            .into_iter()
            .map(|point| SummaryHit::from_payload(point.score, point.payload))
            .collect())
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, Method::POST, Method::PUT, MockServer};

    fn test_index(base_url: String) -> SummaryIndex {
        SummaryIndex {
            client: Client::builder()
                .user_agent("spacebio-test")
                .build()
                .expect("client"),
            base_url,
            api_key: None,
            collection: "space_summaries".into(),
            vector_size: 4,
        }
    }

    #[test]
    fn point_id_is_stable_and_distinct() {
        let a = point_id("https://example.org/a");
        assert_eq!(a, point_id("https://example.org/a"));
        assert_ne!(a, point_id("https://example.org/b"));
    }

    #[tokio::test]
    async fn ensure_collection_creates_when_missing() {
        let server = MockServer::start_async().await;
        let index = test_index(server.base_url());

        let exists = server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/space_summaries");
                then.status(404).body("not found");
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/space_summaries")
                    .json_body_partial(r#"{"vectors": {"size": 4, "distance": "Cosine"}}"#);
                then.status(200).json_body(json!({ "result": true }));
            })
            .await;

        index.ensure_collection().await.expect("collection ensured");
        exists.assert();
        create.assert();
    }

    #[tokio::test]
    async fn ensure_collection_skips_create_when_present() {
        let server = MockServer::start_async().await;
        let index = test_index(server.base_url());

        let exists = server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/space_summaries");
                then.status(200).json_body(json!({ "result": { "status": "green" } }));
            })
            .await;

        index.ensure_collection().await.expect("collection ensured");
        exists.assert();
    }

    #[tokio::test]
    async fn upsert_writes_payload_keyed_by_url_hash() {
        let server = MockServer::start_async().await;
        let index = test_index(server.base_url());
        let id = point_id("https://example.org/paper");

        let mock = server
            .mock_async(move |when, then| {
                when.method(PUT)
                    .path("/collections/space_summaries/points")
                    .query_param("wait", "true")
                    .json_body_partial(format!(
                        r#"{{"points": [{{"id": {id}, "payload": {{"url": "https://example.org/paper", "title": "Paper", "summary": "Bullet points"}}}}]}}"#
                    ));
                then.status(200).json_body(json!({ "result": { "status": "acknowledged" } }));
            })
            .await;

        index
            .upsert(SummaryRecord {
                id,
                vector: vec![0.1, 0.2, 0.3, 0.4],
                url: "https://example.org/paper".into(),
                title: "Paper".into(),
                summary: "Bullet points".into(),
            })
            .await
            .expect("upsert");

        mock.assert();
    }

    #[tokio::test]
    async fn query_maps_scored_payloads() {
        let server = MockServer::start_async().await;
        let index = test_index(server.base_url());

        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/space_summaries/points/query");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": [
                        {
                            "id": 42,
                            "score": 0.91,
                            "payload": {
                                "url": "https://example.org/paper",
                                "title": "Paper",
                                "summary": "Key findings"
                            }
                        }
                    ]
                }));
            })
            .await;

        let hits = index.query(&[0.1, 0.2, 0.3, 0.4], 5).await.expect("hits");
        mock.assert();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "https://example.org/paper");
        assert_eq!(hits[0].summary, "Key findings");
        assert!((hits[0].score - 0.91).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn query_surfaces_store_failures() {
        let server = MockServer::start_async().await;
        let index = test_index(server.base_url());

        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/space_summaries/points/query");
                then.status(502).body("bad gateway");
            })
            .await;

        let error = index
            .query(&[0.0, 0.0, 0.0, 0.0], 5)
            .await
            .expect_err("store failure");
        assert!(matches!(error, QdrantError::UnexpectedStatus { .. }));
    }
}
