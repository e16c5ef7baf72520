//! Ingestion pipeline writing each document into both indexes.
//!
//! For every document the pipeline computes a full-text embedding, a summary, and a
//! summary embedding, then upserts one row into the rich store and one point into the
//! summary index. Failures are isolated per document: a batch logs and skips a failing
//! document and keeps going. The batch count reports documents whose flow completed
//! without error; the two store writes are sequential and not transactional, so a summary
//! write that fails after a successful document write leaves the row in place and marks
//! the document as failed.

use crate::docstore::{DocStoreError, RecordStore};
use crate::embedding::Embedder;
use crate::fetch::{FetchError, Fetcher};
use crate::metrics::EngineMetrics;
use crate::qdrant::{QdrantError, SummaryRecord, SummaryStore, point_id};
use crate::summarization::Summarizer;
use std::sync::Arc;
use thiserror::Error;

/// Longest text prefix submitted to the embedder and summarizer, bounding provider cost.
const FULL_TEXT_PREFIX_CHARS: usize = 8000;
/// Prefix embedded in place of the summary when summarization degraded to "".
const SUMMARY_FALLBACK_PREFIX_CHARS: usize = 2000;
const TITLE_CHARS: usize = 80;
const TITLE_TRUNCATION_THRESHOLD: usize = 83;

/// Errors that fail ingestion of a single document.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Document could not be retrieved.
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    /// Rich store rejected the upsert.
    #[error("document store write failed: {0}")]
    Records(#[from] DocStoreError),
    /// Summary index rejected the upsert.
    #[error("summary index write failed: {0}")]
    Summaries(#[from] QdrantError),
}

/// One raw document entering the pipeline.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Unique document URL; upsert key for both indexes.
    pub url: String,
    /// Optional title hint; derived from the text when absent.
    pub title: Option<String>,
    /// Text used for embedding and summarization.
    pub text: String,
    /// Stored content override (CSV rows store the abstract, not the embed input).
    pub content: Option<String>,
}

/// Coordinates fetching, embedding, summarization, and the dual-store writes.
///
/// Construct once near process start and share through an `Arc`; the pipeline owns
/// long-lived handles to its collaborators.
pub struct IngestionPipeline {
    embedder: Arc<dyn Embedder>,
    summarizer: Arc<dyn Summarizer>,
    records: Arc<dyn RecordStore>,
    summaries: Arc<dyn SummaryStore>,
    fetcher: Fetcher,
    metrics: Arc<EngineMetrics>,
}

impl IngestionPipeline {
    /// Build a pipeline over shared collaborator handles.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        summarizer: Arc<dyn Summarizer>,
        records: Arc<dyn RecordStore>,
        summaries: Arc<dyn SummaryStore>,
        fetcher: Fetcher,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            embedder,
            summarizer,
            records,
            summaries,
            fetcher,
            metrics,
        }
    }

    /// Fetch and ingest up to `max_pages` URLs, returning the success count.
    pub async fn ingest_urls(&self, urls: &[String], max_pages: usize) -> usize {
        let mut inserted = 0usize;
        let mut failed = 0usize;
        for url in urls.iter().take(max_pages) {
            tracing::info!(url, "Fetching document");
            match self.ingest_url(url).await {
                Ok(()) => {
                    inserted += 1;
                    tracing::info!(url, "Document ingested");
                }
                Err(error) => {
                    failed += 1;
                    tracing::warn!(url, error = %error, "Skipping document");
                }
            }
        }
        self.metrics.record_batch(inserted as u64, failed as u64);
        tracing::info!(inserted, failed, "Ingestion batch finished");
        inserted
    }

    /// Download a CSV feed and ingest up to `limit` rows, returning the success count.
    pub async fn ingest_csv(&self, csv_url: &str, limit: usize) -> usize {
        let content = match self.fetcher.fetch_feed(csv_url).await {
            Ok(content) => content,
            Err(error) => {
                tracing::warn!(csv_url, error = %error, "Feed fetch failed");
                return 0;
            }
        };
        let documents = csv_documents(&content, limit);
        tracing::info!(csv_url, rows = documents.len(), "Parsed CSV feed");

        let mut inserted = 0usize;
        let mut failed = 0usize;
        for document in documents {
            let url = document.url.clone();
            match self.ingest_document(document).await {
                Ok(()) => {
                    inserted += 1;
                    tracing::info!(url, "Feed row ingested");
                }
                Err(error) => {
                    failed += 1;
                    tracing::warn!(url, error = %error, "Skipping feed row");
                }
            }
        }
        self.metrics.record_batch(inserted as u64, failed as u64);
        tracing::info!(inserted, failed, "Feed ingestion finished");
        inserted
    }

    async fn ingest_url(&self, url: &str) -> Result<(), IngestError> {
        let text = self.fetcher.fetch_page(url).await?;
        self.ingest_document(SourceDocument {
            url: url.to_string(),
            title: None,
            text,
            content: None,
        })
        .await
    }

    /// Embed, summarize, and upsert one document into both indexes.
    pub async fn ingest_document(&self, document: SourceDocument) -> Result<(), IngestError> {
        let prefix = char_prefix(&document.text, FULL_TEXT_PREFIX_CHARS);
        let title = document
            .title
            .clone()
            .unwrap_or_else(|| derive_title(&document.text));

        let embedding = self.embedder.embed(prefix).await;
        let summary = self.summarizer.summarize(prefix).await;
        let summary_input = if summary.is_empty() {
            char_prefix(&document.text, SUMMARY_FALLBACK_PREFIX_CHARS)
        } else {
            summary.as_str()
        };
        let summary_embedding = self.embedder.embed(summary_input).await;

        let content = document.content.as_deref().unwrap_or(&document.text);
        self.records
            .upsert(&document.url, &title, content, &embedding)
            .await?;

        self.summaries.ensure_collection().await?;
        self.summaries
            .upsert(SummaryRecord {
                id: point_id(&document.url),
                vector: summary_embedding,
                url: document.url,
                title,
                summary,
            })
            .await?;
        Ok(())
    }
}

/// Longest prefix of `text` spanning at most `chars` characters.
fn char_prefix(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// Derive a display title from document text: first 80 chars plus an ellipsis when the
/// text exceeds 83 chars, otherwise the text itself.
fn derive_title(text: &str) -> String {
    if text.chars().count() > TITLE_TRUNCATION_THRESHOLD {
        let mut title: String = text.chars().take(TITLE_CHARS).collect();
        title.push_str("...");
        title
    } else {
        text.to_string()
    }
}

/// Parse a normalized CSV feed into source documents.
///
/// Delimiter is sniffed from the header line (`;` beats `,`), columns resolve
/// case-insensitively (`Title`, `URL`/`Link`, `Abstract`), rows without a link are
/// skipped, and at most `limit` rows are read. Embed input is `title\n\nabstract`; the
/// stored content is the abstract alone.
pub fn csv_documents(content: &str, limit: usize) -> Vec<SourceDocument> {
    let delimiter = detect_delimiter(content);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(error) => {
            tracing::warn!(error = %error, "CSV header parse failed");
            return Vec::new();
        }
    };
    let title_column = find_column(&headers, &["title"]);
    let url_column = find_column(&headers, &["url", "link"]);
    let abstract_column = find_column(&headers, &["abstract"]);

    let mut documents = Vec::new();
    for (index, record) in reader.records().enumerate() {
        if index >= limit {
            break;
        }
        let record = match record {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!(row = index, error = %error, "Skipping malformed CSV row");
                continue;
            }
        };
        let field = |column: Option<usize>| {
            column
                .and_then(|column| record.get(column))
                .unwrap_or("")
                .trim()
                .to_string()
        };

        let link = field(url_column);
        if link.is_empty() {
            continue;
        }
        let mut title = field(title_column);
        if title.is_empty() {
            title = "Untitled".to_string();
        }
        let abstract_text = field(abstract_column);

        documents.push(SourceDocument {
            url: link,
            text: format!("{title}\n\n{abstract_text}"),
            title: Some(title),
            content: Some(abstract_text),
        });
    }
    documents
}

fn detect_delimiter(content: &str) -> u8 {
    if content
        .lines()
        .next()
        .is_some_and(|line| line.contains(';'))
    {
        b';'
    } else {
        b','
    }
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers.iter().position(|header| {
        let normalized = header.trim().to_lowercase();
        names.contains(&normalized.as_str())
    })
}
