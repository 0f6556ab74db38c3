//! PostgreSQL + pgvector backend.
//!
//! Vectors travel as pgvector text literals (`[0.1,0.2,...]`) cast with `::vector`,
//! so no pgvector client crate is needed.

use super::{check_dimensions, EmbeddingRecord, QueryResult, VectorStore};
use crate::error::{AgribotError, Result};
use crate::loader::ChunkMetadata;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Pool and index tuning for [`PgVectorStore`].
#[derive(Debug, Clone, Copy)]
pub struct PgVectorOptions {
    pub pool_size: u32,
    /// `lists` of the ivfflat index, fixed when the index is created.
    pub ivfflat_lists: u32,
    /// `ivfflat.probes` applied to every search.
    pub ivfflat_probes: u32,
}

impl Default for PgVectorOptions {
    fn default() -> Self {
        Self {
            pool_size: 5,
            ivfflat_lists: 100,
            ivfflat_probes: 10,
        }
    }
}

/// Vector store on a `documents` table with an ivfflat cosine index.
pub struct PgVectorStore {
    pool: PgPool,
    dimensions: usize,
    options: PgVectorOptions,
}

fn vector_literal(embedding: &[f32]) -> String {
    let values: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", values.join(","))
}

/// `atttypmod` of `documents.embedding` holds the declared vector width.
const EXISTING_DIMENSIONS_SQL: &str = "SELECT a.atttypmod FROM pg_attribute a
     WHERE a.attrelid = to_regclass('documents') AND a.attname = 'embedding'";

const UPSERT_SQL: &str = "INSERT INTO documents (id, content, metadata, embedding)
     VALUES ($1, $2, $3::jsonb, $4::vector)
     ON CONFLICT (id) DO UPDATE SET
         content = EXCLUDED.content,
         metadata = EXCLUDED.metadata,
         embedding = EXCLUDED.embedding";

/// Cosine distance ascending, ties broken by id.
const SEARCH_SQL: &str = "SELECT id, content, metadata::text AS metadata,
            (embedding <=> $1::vector)::float8 AS distance
     FROM documents
     ORDER BY embedding <=> $1::vector, id
     LIMIT $2";

const DELETE_STALE_SQL: &str = "DELETE FROM documents
     WHERE metadata->>'path' = $1 AND (metadata->>'chunkIndex')::int >= $2";

fn create_table_sql(dimensions: usize) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            metadata JSONB,
            embedding vector({})
        )",
        dimensions
    )
}

fn create_index_sql(lists: u32) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS documents_embedding_idx ON documents
         USING ivfflat (embedding vector_cosine_ops) WITH (lists = {})",
        lists
    )
}

fn set_probes_sql(probes: u32) -> String {
    format!("SET LOCAL ivfflat.probes = {}", probes)
}

impl PgVectorStore {
    /// Connect to `url`. Call [`VectorStore::initialize`] before use.
    pub async fn open(url: &str, dimensions: usize, options: PgVectorOptions) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(options.pool_size)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await?;

        info!("Connected to Postgres vector store (pool size {})", options.pool_size);

        Ok(Self {
            pool,
            dimensions,
            options,
        })
    }

    /// Width of the existing `embedding` column, if the table is already there.
    async fn existing_dimensions(&self) -> Result<Option<usize>> {
        let typmod: Option<i32> = sqlx::query_scalar(EXISTING_DIMENSIONS_SQL)
            .fetch_optional(&self.pool)
        .await?;

        Ok(typmod.filter(|t| *t > 0).map(|t| t as usize))
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    #[instrument(skip(self))]
    async fn initialize(&self) -> Result<()> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await?;

        if let Some(existing) = self.existing_dimensions().await? {
            if existing != self.dimensions {
                return Err(AgribotError::DimensionMismatch {
                    expected: existing,
                    actual: self.dimensions,
                });
            }
            debug!("documents table already exists with vector({})", existing);
        }

        sqlx::query(&create_table_sql(self.dimensions))
            .execute(&self.pool)
            .await?;
        sqlx::query(&create_index_sql(self.options.ivfflat_lists))
            .execute(&self.pool)
            .await?;

        info!("Postgres vector store ready with vector({})", self.dimensions);
        Ok(())
    }

    #[instrument(skip(self, record), fields(id = %record.id))]
    async fn upsert(&self, record: &EmbeddingRecord) -> Result<()> {
        check_dimensions(self.dimensions, &record.embedding)?;

        let metadata = serde_json::to_string(&record.metadata)?;
        sqlx::query(UPSERT_SQL)
            .bind(&record.id)
            .bind(&record.content)
            .bind(&metadata)
            .bind(vector_literal(&record.embedding))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    #[instrument(skip(self, query_embedding))]
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<QueryResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        check_dimensions(self.dimensions, query_embedding)?;

        // SET LOCAL only lasts for the enclosing transaction.
        let mut tx = self.pool.begin().await?;
        sqlx::query(&set_probes_sql(self.options.ivfflat_probes))
            .execute(&mut *tx)
            .await?;

        let rows = sqlx::query(SEARCH_SQL)
            .bind(vector_literal(query_embedding))
            .bind(limit as i64)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let text: String = row.try_get("content")?;
            let metadata: Option<String> = row.try_get("metadata")?;
            let distance: f64 = row.try_get("distance")?;

            let metadata: ChunkMetadata = match metadata.as_deref().map(serde_json::from_str) {
                Some(Ok(m)) => m,
                _ => {
                    warn!("Skipping document {} with unreadable metadata", id);
                    continue;
                }
            };

            results.push(QueryResult {
                id,
                text,
                metadata,
                similarity: (1.0 - distance) as f32,
            });
        }

        debug!("Found {} matching documents", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn delete_stale(&self, path: &str, keep_below: usize) -> Result<usize> {
        let result = sqlx::query(DELETE_STALE_SQL)
            .bind(path)
            .bind(keep_below as i32)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() as usize;
        if deleted > 0 {
            info!("Deleted {} stale chunks of {}", deleted, path);
        }
        Ok(deleted)
    }

    async fn document_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        info!("Closed Postgres vector store");
        Ok(())
    }
}
