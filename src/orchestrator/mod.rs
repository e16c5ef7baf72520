//! Hybrid search orchestration across the two indexes.
//!
//! The orchestrator embeds the query once, executes the legs the routing decision calls
//! for, normalizes heterogeneously-shaped hits into one result schema, and merges them
//! into a single descending-score ranking. Summary scores are Qdrant's native cosine
//! similarity; document scores are `1 - distance` from pgvector. Both point the same
//! direction but are not calibrated against each other, and no rescaling is attempted.

use crate::docstore::{DocStoreError, DocumentHit, RecordStore};
use crate::embedding::Embedder;
use crate::qdrant::{QdrantError, SummaryHit, SummaryStore};
use crate::router::{Intent, RouteDecision, route};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

const SNIPPET_CHARS: usize = 240;

/// Store-level failures that abort a whole search.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Rich index query failed.
    #[error("document store query failed: {0}")]
    Records(#[from] DocStoreError),
    /// Summary index query failed.
    #[error("summary index query failed: {0}")]
    Summaries(#[from] QdrantError),
}

/// One merged search hit, normalized across both indexes.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    /// Originating index: `"summary"` or `"vector"`.
    pub source: &'static str,
    /// Source document URL.
    pub url: String,
    /// Display title.
    pub title: String,
    /// Stored summary text (summary-index hits only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Leading content excerpt (vector-index hits only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    /// Similarity score; higher is more relevant.
    pub score: f32,
}

/// Response envelope returned to the HTTP layer.
#[derive(Debug, Clone, Serialize)]
pub struct SearchEnvelope {
    /// Original query string.
    pub query: String,
    /// Merged, descending-score result list.
    pub results: Vec<SearchResult>,
    /// Primary index per the routing decision (`"summary"` or `"vector"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routed: Option<&'static str>,
    /// Whether both indexes were consulted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hybrid: Option<bool>,
    /// Failure description when a store-level error aborted the search.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Executes routed queries against both indexes and merges the results.
pub struct Orchestrator {
    embedder: Arc<dyn Embedder>,
    records: Arc<dyn RecordStore>,
    summaries: Arc<dyn SummaryStore>,
}

impl Orchestrator {
    /// Build an orchestrator over shared store handles.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        records: Arc<dyn RecordStore>,
        summaries: Arc<dyn SummaryStore>,
    ) -> Self {
        Self {
            embedder,
            records,
            summaries,
        }
    }

    /// Route, execute, and merge one search request.
    ///
    /// Store-level failures in either leg abort the whole search: the envelope then
    /// carries an `error` and an empty result list, never partial hybrid results.
    pub async fn search(&self, query: &str, topk: i64, hybrid: bool) -> SearchEnvelope {
        let decision = route(query);
        let routed = match decision.intent {
            Intent::Summary => "summary",
            Intent::Detail => "vector",
        };
        tracing::info!(
            query,
            routed,
            hybrid,
            keyword = ?decision.keyword,
            topk,
            "Routing search"
        );

        match self.run_legs(query, &decision, topk, hybrid).await {
            Ok(results) => SearchEnvelope {
                query: query.to_string(),
                results,
                routed: Some(routed),
                hybrid: Some(hybrid),
                error: None,
            },
            Err(error) => {
                tracing::error!(query, error = %error, "Search aborted");
                SearchEnvelope {
                    query: query.to_string(),
                    results: Vec::new(),
                    routed: None,
                    hybrid: None,
                    error: Some(error.to_string()),
                }
            }
        }
    }

    async fn run_legs(
        &self,
        query: &str,
        decision: &RouteDecision,
        topk: i64,
        hybrid: bool,
    ) -> Result<Vec<SearchResult>, SearchError> {
        // topk <= 0 still runs the legs with limit 0; boundary values share the normal path.
        let limit = topk.max(0) as usize;
        let vector = self.embedder.embed(query).await;

        let mut results = Vec::new();
        if hybrid || decision.intent == Intent::Summary {
            let hits = self.summaries.query(&vector, limit).await?;
            results.extend(hits.into_iter().map(summary_result));
        }
        if hybrid || decision.intent == Intent::Detail {
            let hits = self
                .records
                .query(&vector, limit, decision.keyword.as_deref())
                .await?;
            results.extend(hits.into_iter().map(vector_result));
        }

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(limit);
        Ok(results)
    }
}

fn summary_result(hit: SummaryHit) -> SearchResult {
    SearchResult {
        source: "summary",
        url: hit.url,
        title: hit.title,
        summary: Some(hit.summary),
        snippet: None,
        score: hit.score,
    }
}

fn vector_result(hit: DocumentHit) -> SearchResult {
    SearchResult {
        source: "vector",
        url: hit.url,
        title: hit.title,
        summary: None,
        snippet: Some(snippet(&hit.content)),
        score: hit.score,
    }
}

fn snippet(content: &str) -> String {
    let mut excerpt: String = content.chars().take(SNIPPET_CHARS).collect();
    excerpt.push_str("...");
    excerpt
}
