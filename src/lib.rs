#![deny(missing_docs)]

//! Core library for the SpaceBio hybrid search engine.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Postgres/pgvector document store (rich index).
pub mod docstore;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Engine service wiring ingestion and search behind one API.
pub mod engine;
/// Document fetching and plain-text extraction.
pub mod fetch;
/// Ingestion pipeline writing into both indexes.
pub mod ingest;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion and search counters.
pub mod metrics;
/// Hybrid search orchestration and result merging.
pub mod orchestrator;
/// Qdrant summary index integration.
pub mod qdrant;
/// Lexical query routing.
pub mod router;
/// Summarization client abstraction and adapters.
pub mod summarization;
