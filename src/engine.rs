//! Engine service tying ingestion and search together.
//!
//! The service owns the long-lived store handles (Postgres pool, Qdrant client) and the
//! provider adapters. Everything is constructed once near process start and shared through
//! `Arc`s — there are no process-global clients — then exposed to the HTTP layer behind
//! the [`EngineApi`] trait so routes stay testable with stubs.

use crate::docstore::{DocumentStore, RecordStore};
use crate::embedding::{Embedder, HttpEmbedder};
use crate::fetch::Fetcher;
use crate::ingest::IngestionPipeline;
use crate::metrics::{EngineMetrics, MetricsSnapshot};
use crate::orchestrator::{Orchestrator, SearchEnvelope};
use crate::qdrant::{SummaryIndex, SummaryStore};
use crate::summarization::{HttpSummarizer, Summarizer};
use async_trait::async_trait;
use std::sync::Arc;

/// Abstraction over the engine used by the HTTP surface.
#[async_trait]
pub trait EngineApi: Send + Sync {
    /// Fetch and ingest up to `max_pages` URLs; returns the success count.
    async fn ingest_urls(&self, urls: Vec<String>, max_pages: usize) -> usize;

    /// Download a CSV feed and ingest up to `limit` rows; returns the success count.
    async fn ingest_csv(&self, csv_url: String, limit: usize) -> usize;

    /// Execute one hybrid search request.
    async fn search(&self, query: String, topk: i64, hybrid: bool) -> SearchEnvelope;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Production engine wiring the pipeline and orchestrator over real backends.
pub struct EngineService {
    pipeline: IngestionPipeline,
    orchestrator: Orchestrator,
    metrics: Arc<EngineMetrics>,
}

impl EngineService {
    /// Build a new engine, eagerly initializing both backing stores.
    ///
    /// Establishes the Postgres pool and schema, constructs the Qdrant client, and ensures
    /// the summary collection exists so the first request does not pay setup costs.
    pub async fn new() -> Self {
        tracing::info!("Connecting document store");
        let records = Arc::new(
            DocumentStore::connect()
                .await
                .expect("Failed to connect to Postgres"),
        );
        records
            .init_schema()
            .await
            .expect("Failed to ensure document schema");

        let summaries =
            Arc::new(SummaryIndex::new().expect("Failed to construct Qdrant client"));
        summaries
            .ensure_collection()
            .await
            .expect("Failed to ensure summary collection");
        tracing::info!("Both indexes ready");

        let embedder: Arc<dyn Embedder> = Arc::new(HttpEmbedder::from_config());
        let summarizer: Arc<dyn Summarizer> = Arc::new(HttpSummarizer::from_config());
        let metrics = Arc::new(EngineMetrics::new());

        let records: Arc<dyn RecordStore> = records;
        let summaries: Arc<dyn SummaryStore> = summaries;

        let pipeline = IngestionPipeline::new(
            embedder.clone(),
            summarizer,
            records.clone(),
            summaries.clone(),
            Fetcher::new(),
            metrics.clone(),
        );
        let orchestrator = Orchestrator::new(embedder, records, summaries);

        Self {
            pipeline,
            orchestrator,
            metrics,
        }
    }
}

#[async_trait]
impl EngineApi for EngineService {
    async fn ingest_urls(&self, urls: Vec<String>, max_pages: usize) -> usize {
        self.pipeline.ingest_urls(&urls, max_pages).await
    }

    async fn ingest_csv(&self, csv_url: String, limit: usize) -> usize {
        self.pipeline.ingest_csv(&csv_url, limit).await
    }

    async fn search(&self, query: String, topk: i64, hybrid: bool) -> SearchEnvelope {
        self.metrics.record_search();
        self.orchestrator.search(&query, topk, hybrid).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
