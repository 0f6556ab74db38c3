//! SQLite-based vector store implementation.
//!
//! Uses SQLite with cosine similarity computed in Rust. Every search is an exact scan;
//! use the Postgres backend when the corpus outgrows that.

use super::{check_dimensions, cosine_similarity, rank, EmbeddingRecord, QueryResult, VectorStore};
use crate::error::{AgribotError, Result};
use crate::loader::ChunkMetadata;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    dimensions: usize,
}

impl SqliteVectorStore {
    /// Open (or create) a SQLite vector store at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path, dimensions: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::create_schema(&conn, dimensions)?;

        info!("Opened SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
            dimensions,
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory(dimensions: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::create_schema(&conn, dimensions)?;

        Ok(Self {
            conn: Mutex::new(conn),
            dimensions,
        })
    }

    /// Create tables if missing and pin the vector width on first use.
    fn create_schema(conn: &Connection, dimensions: usize) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL,
                path TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                embedding BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_path ON documents(path);

            CREATE TABLE IF NOT EXISTS store_info (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM store_info WHERE key = 'dimensions'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match stored {
            Some(value) => {
                let existing: usize = value.parse().map_err(|_| {
                    AgribotError::VectorStore(format!("Corrupt dimensions entry: {}", value))
                })?;
                if existing != dimensions {
                    return Err(AgribotError::DimensionMismatch {
                        expected: existing,
                        actual: dimensions,
                    });
                }
            }
            None => {
                conn.execute(
                    "INSERT INTO store_info (key, value) VALUES ('dimensions', ?1)",
                    params![dimensions.to_string()],
                )?;
            }
        }

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| AgribotError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn initialize(&self) -> Result<()> {
        let conn = self.lock()?;
        Self::create_schema(&conn, self.dimensions)
    }

    #[instrument(skip(self, record), fields(id = %record.id))]
    async fn upsert(&self, record: &EmbeddingRecord) -> Result<()> {
        check_dimensions(self.dimensions, &record.embedding)?;

        let metadata = serde_json::to_string(&record.metadata)?;
        let embedding_bytes = Self::embedding_to_bytes(&record.embedding);

        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO documents (id, content, metadata, path, chunk_index, embedding)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                content = excluded.content,
                metadata = excluded.metadata,
                path = excluded.path,
                chunk_index = excluded.chunk_index,
                embedding = excluded.embedding
            "#,
            params![
                record.id,
                record.content,
                metadata,
                record.metadata.path,
                record.metadata.chunk_index as i64,
                embedding_bytes,
            ],
        )?;

        debug!("Upserted document {}", record.id);
        Ok(())
    }

    #[instrument(skip(self, query_embedding))]
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<QueryResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        check_dimensions(self.dimensions, query_embedding)?;

        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, content, metadata, embedding FROM documents")?;

        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let content: String = row.get(1)?;
            let metadata: String = row.get(2)?;
            let embedding_bytes: Vec<u8> = row.get(3)?;
            Ok((id, content, metadata, embedding_bytes))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (id, text, metadata, embedding_bytes) = row?;
            let metadata: ChunkMetadata = match serde_json::from_str(&metadata) {
                Ok(m) => m,
                Err(e) => {
                    warn!("Skipping document {} with unreadable metadata: {}", id, e);
                    continue;
                }
            };
            let embedding = Self::bytes_to_embedding(&embedding_bytes);
            results.push(QueryResult {
                similarity: cosine_similarity(query_embedding, &embedding),
                id,
                text,
                metadata,
            });
        }

        let results = rank(results, limit);
        debug!("Found {} matching documents", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn delete_stale(&self, path: &str, keep_below: usize) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM documents WHERE path = ?1 AND chunk_index >= ?2",
            params![path, keep_below as i64],
        )?;

        if deleted > 0 {
            info!("Deleted {} stale chunks of {}", deleted, path);
        }
        Ok(deleted)
    }

    async fn document_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
