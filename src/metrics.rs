use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing ingestion and search activity.
#[derive(Default)]
pub struct EngineMetrics {
    documents_ingested: AtomicU64,
    documents_failed: AtomicU64,
    searches_served: AtomicU64,
}

impl EngineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one ingestion batch.
    pub fn record_batch(&self, ingested: u64, failed: u64) {
        self.documents_ingested.fetch_add(ingested, Ordering::Relaxed);
        self.documents_failed.fetch_add(failed, Ordering::Relaxed);
    }

    /// Record one served search request.
    pub fn record_search(&self) {
        self.searches_served.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            documents_failed: self.documents_failed.load(Ordering::Relaxed),
            searches_served: self.searches_served.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of engine counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents fully upserted into both indexes since startup.
    pub documents_ingested: u64,
    /// Documents skipped due to per-document failures since startup.
    pub documents_failed: u64,
    /// Search requests served since startup.
    pub searches_served: u64,
}
