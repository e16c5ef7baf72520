use async_trait::async_trait;
use httpmock::{Method::POST, MockServer};
use serde_json::json;
use spacebio::{
    config,
    docstore::{DocStoreError, DocumentHit, RecordStore},
    embedding::HttpEmbedder,
    logging,
    orchestrator::Orchestrator,
    qdrant::SummaryIndex,
};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

static BACKEND: OnceCell<&'static MockServer> = OnceCell::const_new();

fn set_env(key: &str, value: &str) {
    // SAFETY: Tests run in a single process and establish deterministic configuration upfront.
    unsafe { std::env::set_var(key, value) }
}

/// Start one shared mock backend serving both the embedding provider and the
/// summary index, and point the process configuration at it.
async fn mock_backend() -> &'static MockServer {
    *BACKEND
        .get_or_init(|| async {
            let server: &'static MockServer = Box::leak(Box::new(MockServer::start_async().await));
            let base_url = server.base_url();

            set_env("DATABASE_URL", "postgres://localhost/spacebio_test");
            set_env("QDRANT_URL", &base_url);
            set_env("QDRANT_COLLECTION_NAME", "space_summaries");
            set_env("EMBEDDING_PROVIDER", "ollama");
            set_env("EMBEDDING_MODEL", "nomic-embed-text:latest");
            set_env("EMBEDDING_DIMENSION", "4");
            set_env("CHAT_MODEL", "llama3.1:8b");
            set_env("OLLAMA_URL", &base_url);

            server
                .mock_async(|when, then| {
                    when.method(POST).path("/api/embeddings");
                    then.status(200)
                        .json_body(json!({ "embedding": [0.1, 0.2, 0.3, 0.4] }));
                })
                .await;
            server
                .mock_async(|when, then| {
                    when.method(POST)
                        .path("/collections/space_summaries/points/query");
                    then.status(200).json_body(json!({
                        "status": "ok",
                        "time": 0.0,
                        "result": [
                            {
                                "id": 1,
                                "score": 0.92,
                                "payload": {
                                    "url": "https://example.org/osteoblast",
                                    "title": "Osteoblast response",
                                    "summary": "- bone loss\n- microgravity"
                                }
                            },
                            {
                                "id": 2,
                                "score": 0.48,
                                "payload": {
                                    "url": "https://example.org/arabidopsis",
                                    "title": "Arabidopsis roots",
                                    "summary": "- root growth"
                                }
                            }
                        ]
                    }));
                })
                .await;

            config::init_config();
            logging::init_tracing();
            server
        })
        .await
}

#[derive(Default)]
struct StubRecordStore {
    hits: Vec<DocumentHit>,
    fail: bool,
    queries: Mutex<Vec<(usize, Option<String>)>>,
}

#[async_trait]
impl RecordStore for StubRecordStore {
    async fn upsert(
        &self,
        _url: &str,
        _title: &str,
        _content: &str,
        _embedding: &[f32],
    ) -> Result<(), DocStoreError> {
        Ok(())
    }

    async fn query(
        &self,
        _embedding: &[f32],
        limit: usize,
        keyword: Option<&str>,
    ) -> Result<Vec<DocumentHit>, DocStoreError> {
        self.queries
            .lock()
            .unwrap()
            .push((limit, keyword.map(str::to_string)));
        if self.fail {
            return Err(DocStoreError::Sqlx(sqlx::Error::PoolClosed));
        }
        Ok(self.hits.iter().take(limit).cloned().collect())
    }
}

fn orchestrator(records: StubRecordStore) -> (Orchestrator, Arc<StubRecordStore>) {
    let records = Arc::new(records);
    let orchestrator = Orchestrator::new(
        Arc::new(HttpEmbedder::from_config()),
        records.clone(),
        Arc::new(SummaryIndex::new().expect("summary index client")),
    );
    (orchestrator, records)
}

fn document_hit(url: &str, score: f32) -> DocumentHit {
    DocumentHit {
        url: url.into(),
        title: format!("Document {url}"),
        content: "microgravity exposure alters bone formation ".repeat(12),
        score,
    }
}

#[tokio::test]
async fn hybrid_search_merges_summary_index_with_document_hits() {
    mock_backend().await;
    let (orchestrator, _) = orchestrator(StubRecordStore {
        hits: vec![
            document_hit("https://example.org/doc-a", 0.71),
            document_hit("https://example.org/doc-b", 0.33),
        ],
        ..Default::default()
    });

    let envelope = orchestrator
        .search("bone density in microgravity", 10, true)
        .await;

    assert!(envelope.error.is_none());
    assert_eq!(envelope.routed, Some("vector"));
    assert_eq!(envelope.hybrid, Some(true));

    let scores: Vec<f32> = envelope.results.iter().map(|hit| hit.score).collect();
    assert_eq!(scores, vec![0.92, 0.71, 0.48, 0.33]);
    let sources: Vec<&str> = envelope.results.iter().map(|hit| hit.source).collect();
    assert_eq!(sources, vec!["summary", "vector", "summary", "vector"]);

    let top = &envelope.results[0];
    assert_eq!(top.url, "https://example.org/osteoblast");
    assert_eq!(top.summary.as_deref(), Some("- bone loss\n- microgravity"));
    assert!(top.snippet.is_none());

    let detail = &envelope.results[1];
    assert!(detail.summary.is_none());
    let snippet = detail.snippet.as_deref().expect("snippet");
    assert_eq!(snippet.chars().count(), 243);
    assert!(snippet.ends_with("..."));
}

#[tokio::test]
async fn summary_intent_consults_only_the_summary_index() {
    mock_backend().await;
    let (orchestrator, records) = orchestrator(StubRecordStore {
        hits: vec![document_hit("https://example.org/doc-a", 0.99)],
        ..Default::default()
    });

    let envelope = orchestrator
        .search("give me an overview of plant studies", 5, false)
        .await;

    assert!(envelope.error.is_none());
    assert_eq!(envelope.routed, Some("summary"));
    assert_eq!(envelope.hybrid, Some(false));
    assert!(envelope.results.iter().all(|hit| hit.source == "summary"));
    assert!(records.queries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn keyword_filter_reaches_the_record_store() {
    mock_backend().await;
    let (orchestrator, records) = orchestrator(StubRecordStore {
        hits: vec![document_hit("https://example.org/doc-a", 0.6)],
        ..Default::default()
    });

    let envelope = orchestrator.search("kw:radiation dose effects", 3, false).await;

    assert!(envelope.error.is_none());
    assert_eq!(envelope.routed, Some("vector"));
    assert_eq!(
        records.queries.lock().unwrap().as_slice(),
        &[(3, Some("radiation".to_string()))]
    );
}

#[tokio::test]
async fn record_store_failure_aborts_the_whole_search() {
    mock_backend().await;
    let (orchestrator, _) = orchestrator(StubRecordStore {
        fail: true,
        ..Default::default()
    });

    let envelope = orchestrator
        .search("bone density in microgravity", 5, true)
        .await;

    assert!(envelope.results.is_empty());
    assert!(envelope.routed.is_none());
    assert!(envelope.hybrid.is_none());
    let error = envelope.error.expect("error message");
    assert!(error.contains("document store"));
}
