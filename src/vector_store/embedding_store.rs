//! The embedding-aware store: text in, ranked chunks out.

use super::{EmbeddingRecord, QueryResult, VectorStore};
use crate::embedding::Embedder;
use crate::error::{AgribotError, Result};
use crate::loader::{ChunkMetadata, DocumentChunk};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Number of results returned when the caller does not ask for a count.
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Convert a caller-supplied limit to a count, rejecting negatives.
pub fn validate_limit(limit: i64) -> Result<usize> {
    usize::try_from(limit)
        .map_err(|_| AgribotError::InvalidInput(format!("limit must not be negative, got {}", limit)))
}

/// Pairs a vector backend with the embedder that produces its vectors.
///
/// Ingestion and retrieval both go through this type, so the same model embeds
/// chunks and queries.
#[derive(Clone)]
pub struct EmbeddingStore {
    embedder: Arc<dyn Embedder>,
    backend: Arc<dyn VectorStore>,
}

impl EmbeddingStore {
    pub fn new(embedder: Arc<dyn Embedder>, backend: Arc<dyn VectorStore>) -> Self {
        Self { embedder, backend }
    }

    /// Embed `text` and write it under `id`, replacing any previous record.
    ///
    /// Nothing is written when the embedding call fails or returns a vector of the
    /// wrong width.
    #[instrument(skip(self, text, metadata), fields(source = %metadata.source))]
    pub async fn upsert(&self, id: &str, text: &str, metadata: ChunkMetadata) -> Result<()> {
        let embedding = self.embedder.embed(text).await?;

        let record = EmbeddingRecord {
            id: id.to_string(),
            content: text.to_string(),
            metadata,
            embedding,
        };
        self.backend.upsert(&record).await
    }

    /// Upsert a loaded chunk.
    pub async fn upsert_chunk(&self, chunk: &DocumentChunk) -> Result<()> {
        self.upsert(&chunk.id, &chunk.text, chunk.metadata.clone()).await
    }

    /// Top `limit` stored chunks most similar to `query`.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<QueryResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        if query.trim().is_empty() {
            return Err(AgribotError::InvalidInput("Query is required".to_string()));
        }

        let query_embedding = self.embedder.embed(query).await?;
        let results = self.backend.search(&query_embedding, limit).await?;
        debug!("Retrieved {} chunks", results.len());
        Ok(results)
    }

    /// Drop chunks of the file at `path` left over from a longer previous version.
    pub async fn delete_stale(&self, path: &str, total_chunks: usize) -> Result<usize> {
        self.backend.delete_stale(path, total_chunks).await
    }

    pub fn backend(&self) -> &Arc<dyn VectorStore> {
        &self.backend
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }
}
