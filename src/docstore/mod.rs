//! Rich document store backed by Postgres with the pgvector extension.
//!
//! One row per document URL: the full extracted text plus its full-document embedding.
//! Upserts are keyed by `url` so re-ingestion replaces every non-key field atomically for
//! that row. Queries rank by the pgvector cosine distance operator and report
//! `1 - distance` so scores point the same direction as the summary index.

use crate::config::get_config;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::fmt::Write as _;
use std::time::Duration;
use thiserror::Error;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_CONNECTIONS: u32 = 5;

/// Errors returned while interacting with the document store.
#[derive(Debug, Error)]
pub enum DocStoreError {
    /// Postgres query or connection failure.
    #[error("Postgres operation failed: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Scored document returned by nearest-neighbor queries.
#[derive(Debug, Clone)]
pub struct DocumentHit {
    /// Unique document URL.
    pub url: String,
    /// Display title derived at ingestion time.
    pub title: String,
    /// Full extracted text.
    pub content: String,
    /// Similarity-like score (`1 - cosine distance`, higher is better).
    pub score: f32,
}

/// Interface to the rich full-text index.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or replace the record for `url`.
    async fn upsert(
        &self,
        url: &str,
        title: &str,
        content: &str,
        embedding: &[f32],
    ) -> Result<(), DocStoreError>;

    /// Rank stored documents by distance to `embedding`, optionally restricted to rows
    /// whose title or content contains `keyword` (case-insensitive).
    async fn query(
        &self,
        embedding: &[f32],
        limit: usize,
        keyword: Option<&str>,
    ) -> Result<Vec<DocumentHit>, DocStoreError>;
}

/// Postgres-backed implementation of [`RecordStore`].
pub struct DocumentStore {
    pool: PgPool,
}

impl DocumentStore {
    /// Connect to Postgres using the configured `DATABASE_URL`.
    pub async fn connect() -> Result<Self, DocStoreError> {
        let config = get_config();
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(&config.database_url)
            .await?;
        tracing::debug!("Connected to Postgres document store");
        Ok(Self { pool })
    }

    /// Wrap an existing pool; used by callers that manage their own connection setup.
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Ensure the pgvector extension and the `space_docs` table exist.
    ///
    /// Idempotent; the embedding column is sized from `EMBEDDING_DIMENSION`.
    pub async fn init_schema(&self) -> Result<(), DocStoreError> {
        let config = get_config();
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await?;
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS space_docs (\n\
             id BIGSERIAL PRIMARY KEY,\n\
             url TEXT UNIQUE NOT NULL,\n\
             title TEXT NOT NULL,\n\
             content TEXT NOT NULL,\n\
             embedding vector({dimension}),\n\
             ingested_at TIMESTAMPTZ NOT NULL DEFAULT now()\n\
             )",
            dimension = config.embedding_dimension
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        tracing::debug!(dimension = config.embedding_dimension, "Document schema ensured");
        Ok(())
    }
}

#[async_trait]
impl RecordStore for DocumentStore {
    async fn upsert(
        &self,
        url: &str,
        title: &str,
        content: &str,
        embedding: &[f32],
    ) -> Result<(), DocStoreError> {
        sqlx::query(
            "INSERT INTO space_docs (url, title, content, embedding, ingested_at)\n\
             VALUES ($1, $2, $3, $4::vector, now())\n\
             ON CONFLICT (url) DO UPDATE SET\n\
               title = EXCLUDED.title,\n\
               content = EXCLUDED.content,\n\
               embedding = EXCLUDED.embedding,\n\
               ingested_at = EXCLUDED.ingested_at",
        )
        .bind(url)
        .bind(title)
        .bind(content)
        .bind(vector_literal(embedding))
        .execute(&self.pool)
        .await?;
        tracing::debug!(url, "Document upserted");
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        limit: usize,
        keyword: Option<&str>,
    ) -> Result<Vec<DocumentHit>, DocStoreError> {
        let sql = search_sql(keyword.is_some());
        let literal = vector_literal(embedding);
        let mut query = sqlx::query(&sql).bind(&literal).bind(limit as i64);
        if let Some(keyword) = keyword {
            query = query.bind(like_pattern(keyword));
        }

        let rows = query.fetch_all(&self.pool).await?;
        let hits = rows
            .into_iter()
            .map(|row| {
                Ok(DocumentHit {
                    url: row.try_get("url")?,
                    title: row.try_get("title")?,
                    content: row.try_get("content")?,
                    score: row.try_get::<f64, _>("score")? as f32,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(hits)
    }
}

/// Render a pgvector text literal (`[x,y,...]`) for parameter binding.
///
/// Binding the literal and casting with `::vector` keeps the store free of any
/// pgvector-specific client types.
fn vector_literal(embedding: &[f32]) -> String {
    let mut literal = String::with_capacity(embedding.len() * 8 + 2);
    literal.push('[');
    for (index, value) in embedding.iter().enumerate() {
        if index > 0 {
            literal.push(',');
        }
        let _ = write!(literal, "{value}");
    }
    literal.push(']');
    literal
}

fn search_sql(with_keyword: bool) -> String {
    let filter = if with_keyword {
        "WHERE title ILIKE $3 OR content ILIKE $3\n"
    } else {
        ""
    };
    format!(
        "SELECT url, title, content, 1 - (embedding <=> $1::vector) AS score\n\
         FROM space_docs\n\
         {filter}\
         ORDER BY embedding <=> $1::vector\n\
         LIMIT $2"
    )
}

fn like_pattern(keyword: &str) -> String {
    format!("%{keyword}%")
}

#[cfg(test)]
mod tests {
    use super::{like_pattern, search_sql, vector_literal};

    #[test]
    fn vector_literal_renders_pgvector_syntax() {
        assert_eq!(vector_literal(&[1.0, -0.5, 0.25]), "[1,-0.5,0.25]");
        assert_eq!(vector_literal(&[]), "[]");
    }

    #[test]
    fn search_sql_orders_by_distance_ascending() {
        let sql = search_sql(false);
        assert!(sql.contains("ORDER BY embedding <=> $1::vector"));
        assert!(sql.contains("1 - (embedding <=> $1::vector) AS score"));
        assert!(!sql.contains("ILIKE"));
    }

    #[test]
    fn search_sql_applies_keyword_filter_to_title_and_content() {
        let sql = search_sql(true);
        assert!(sql.contains("WHERE title ILIKE $3 OR content ILIKE $3"));
    }

    #[test]
    fn like_pattern_wraps_keyword() {
        assert_eq!(like_pattern("bone"), "%bone%");
    }
}
