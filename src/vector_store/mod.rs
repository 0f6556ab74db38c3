//! Vector store abstraction for AgriBot.
//!
//! Provides a trait-based interface for different vector database backends, and
//! [`EmbeddingStore`], which pairs a backend with the embedder that feeds it.

mod embedding_store;
mod memory;
mod postgres;
mod sqlite;

pub use embedding_store::{validate_limit, EmbeddingStore, DEFAULT_SEARCH_LIMIT};
pub use memory::MemoryVectorStore;
pub use postgres::{PgVectorOptions, PgVectorStore};
pub use sqlite::SqliteVectorStore;

use crate::error::{AgribotError, Result};
use crate::loader::ChunkMetadata;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A chunk with its embedding, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Chunk id, primary key.
    pub id: String,
    /// Chunk text.
    pub content: String,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
}

/// A ranked search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Cosine similarity, higher is better.
    pub similarity: f32,
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create schema and indexes. Safe to call on an already initialized store.
    async fn initialize(&self) -> Result<()>;

    /// Insert or fully replace the record with the same id.
    async fn upsert(&self, record: &EmbeddingRecord) -> Result<()>;

    /// Return up to `limit` records ordered by descending similarity, ties by id.
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<QueryResult>>;

    /// Delete records cut from the file at `path` whose chunk index is `>= keep_below`.
    async fn delete_stale(&self, path: &str, keep_below: usize) -> Result<usize>;

    /// Get total record count.
    async fn document_count(&self) -> Result<usize>;

    /// Vector width every record must have.
    fn dimensions(&self) -> usize;

    /// Release connections. The store must not be used afterwards.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Reject vectors whose width differs from the store's.
pub fn check_dimensions(expected: usize, embedding: &[f32]) -> Result<()> {
    if embedding.len() != expected {
        return Err(AgribotError::DimensionMismatch {
            expected,
            actual: embedding.len(),
        });
    }
    Ok(())
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Sort by descending similarity, then ascending id, and keep the first `limit`.
pub(crate) fn rank(mut results: Vec<QueryResult>, limit: usize) -> Vec<QueryResult> {
    results.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    results.truncate(limit);
    results
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;

    pub(crate) fn record(id: &str, source: &str, index: usize, embedding: Vec<f32>) -> EmbeddingRecord {
        let now = Utc::now();
        EmbeddingRecord {
            id: id.to_string(),
            content: format!("content of {}", id),
            metadata: ChunkMetadata {
                source: source.to_string(),
                path: format!("/docs/{}", source),
                chunk_index: index,
                total_chunks: index + 1,
                file_type: "txt".to_string(),
                created: now,
                modified: now,
            },
            embedding,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);

        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_rank_breaks_ties_by_id() {
        let hit = |id: &str, similarity: f32| QueryResult {
            id: id.to_string(),
            text: String::new(),
            metadata: record(id, "s.txt", 0, vec![]).metadata,
            similarity,
        };
        let ranked = rank(vec![hit("b", 0.5), hit("c", 0.9), hit("a", 0.5)], 2);
        let ids: Vec<_> = ranked.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[test]
    fn test_check_dimensions() {
        assert!(check_dimensions(3, &[1.0, 2.0, 3.0]).is_ok());
        assert!(matches!(
            check_dimensions(3, &[1.0, 2.0]),
            Err(AgribotError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }
}
