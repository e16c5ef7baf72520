//! HTTP surface for the SpaceBio engine.
//!
//! A compact Axum router with the endpoints the original gateway exposed:
//!
//! - `POST /api/ingest` – Fetch a list of URLs, embed/summarize each document, and upsert
//!   into both indexes. Returns `{ "inserted": count }`.
//! - `POST /api/ingest_csv` – Download a publications CSV feed and ingest its rows.
//!   Body is optional; defaults target the SpaceBio publications feed.
//! - `POST /api/search` – Route, execute, and merge a hybrid search. Error-shaped
//!   envelopes map to a 500 with the envelope still in the body.
//! - `GET /metrics` – Ingestion/search counters for observability.
//! - `GET /healthz` – Liveness probe with a UTC timestamp.
//!
//! CORS is wide open, matching the original gateway's permissive middleware.

use crate::config::get_config;
use crate::engine::EngineApi;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tower_http::cors::{Any, CorsLayer};

/// Default publications feed ingested by `POST /api/ingest_csv`.
const DEFAULT_CSV_URL: &str =
    "https://raw.githubusercontent.com/jgalazka/SB_publications/main/SB_publication_PMC.csv";

/// Build the HTTP router exposing the engine API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: EngineApi + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/ingest", post(ingest::<S>))
        .route("/api/ingest_csv", post(ingest_csv::<S>))
        .route("/api/search", post(search::<S>))
        .route("/metrics", get(metrics::<S>))
        .route("/healthz", get(healthz))
        .layer(cors)
        .with_state(service)
}

/// Request body for `POST /api/ingest`.
#[derive(Deserialize)]
struct IngestRequest {
    /// URLs to fetch and ingest.
    #[serde(default)]
    urls: Vec<String>,
    /// Upper bound on how many of the supplied URLs are processed.
    #[serde(default = "default_max_pages")]
    max_pages: usize,
}

fn default_max_pages() -> usize {
    100
}

/// Response body shared by both ingestion endpoints.
#[derive(Serialize)]
struct IngestResponse {
    inserted: usize,
}

async fn ingest<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<IngestRequest>,
) -> Json<IngestResponse>
where
    S: EngineApi,
{
    tracing::info!(
        urls = request.urls.len(),
        max_pages = request.max_pages,
        "Ingest request"
    );
    let inserted = service.ingest_urls(request.urls, request.max_pages).await;
    tracing::info!(inserted, "Ingest request completed");
    Json(IngestResponse { inserted })
}

/// Optional request body for `POST /api/ingest_csv`.
#[derive(Deserialize, Default)]
struct IngestCsvRequest {
    /// Feed override; defaults to the SpaceBio publications CSV.
    #[serde(default)]
    url: Option<String>,
    /// Upper bound on how many feed rows are processed.
    #[serde(default = "default_csv_limit")]
    limit: usize,
}

fn default_csv_limit() -> usize {
    50
}

async fn ingest_csv<S>(
    State(service): State<Arc<S>>,
    request: Option<Json<IngestCsvRequest>>,
) -> Json<IngestResponse>
where
    S: EngineApi,
{
    let Json(request) = request.unwrap_or_default();
    let url = request.url.unwrap_or_else(|| DEFAULT_CSV_URL.to_string());
    tracing::info!(url, limit = request.limit, "CSV ingest request");
    let inserted = service.ingest_csv(url, request.limit).await;
    tracing::info!(inserted, "CSV ingest request completed");
    Json(IngestResponse { inserted })
}

/// Request body for `POST /api/search`.
#[derive(Deserialize)]
struct SearchRequest {
    /// Query string to route and execute.
    query: String,
    /// Result budget; defaults to `DEFAULT_TOPK`.
    #[serde(default)]
    topk: Option<i64>,
    /// Whether to consult both indexes regardless of intent.
    #[serde(default = "default_hybrid")]
    hybrid: bool,
}

fn default_hybrid() -> bool {
    true
}

async fn search<S>(State(service): State<Arc<S>>, Json(request): Json<SearchRequest>) -> Response
where
    S: EngineApi,
{
    let topk = request
        .topk
        .unwrap_or_else(|| get_config().search_default_topk);
    tracing::info!(query = %request.query, topk, hybrid = request.hybrid, "Search request");
    let envelope = service.search(request.query, topk, request.hybrid).await;
    tracing::info!(results = envelope.results.len(), "Search request completed");

    if envelope.error.is_some() {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(envelope)).into_response()
    } else {
        Json(envelope).into_response()
    }
}

async fn metrics<S>(State(service): State<Arc<S>>) -> Json<crate::metrics::MetricsSnapshot>
where
    S: EngineApi,
{
    Json(service.metrics_snapshot())
}

async fn healthz() -> Json<serde_json::Value> {
    let time = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    Json(json!({ "ok": true, "time": time }))
}
