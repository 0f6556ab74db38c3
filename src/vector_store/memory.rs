//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{check_dimensions, cosine_similarity, rank, EmbeddingRecord, QueryResult, VectorStore};
use crate::error::{AgribotError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory vector store.
pub struct MemoryVectorStore {
    records: RwLock<HashMap<String, EmbeddingRecord>>,
    dimensions: usize,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store for vectors of `dimensions` width.
    pub fn new(dimensions: usize) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            dimensions,
        }
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> AgribotError {
    AgribotError::VectorStore(format!("Failed to acquire lock: {}", e))
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, record: &EmbeddingRecord) -> Result<()> {
        check_dimensions(self.dimensions, &record.embedding)?;
        let mut records = self.records.write().map_err(poisoned)?;
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<QueryResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        check_dimensions(self.dimensions, query_embedding)?;

        let records = self.records.read().map_err(poisoned)?;
        let results: Vec<QueryResult> = records
            .values()
            .map(|r| QueryResult {
                id: r.id.clone(),
                text: r.content.clone(),
                metadata: r.metadata.clone(),
                similarity: cosine_similarity(query_embedding, &r.embedding),
            })
            .collect();

        Ok(rank(results, limit))
    }

    async fn delete_stale(&self, path: &str, keep_below: usize) -> Result<usize> {
        let mut records = self.records.write().map_err(poisoned)?;
        let initial_len = records.len();
        records.retain(|_, r| !(r.metadata.path == path && r.metadata.chunk_index >= keep_below));
        Ok(initial_len - records.len())
    }

    async fn document_count(&self) -> Result<usize> {
        Ok(self.records.read().map_err(poisoned)?.len())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::tests::record;

    #[tokio::test]
    async fn test_memory_vector_store() {
        let store = MemoryVectorStore::new(3);

        store.upsert(&record("a", "drip.txt", 0, vec![1.0, 0.0, 0.0])).await.unwrap();
        store.upsert(&record("b", "drip.txt", 1, vec![0.0, 1.0, 0.0])).await.unwrap();

        assert_eq!(store.document_count().await.unwrap(), 2);

        let results = store.search(&[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert!(results[0].similarity > results[1].similarity);

        assert!(store.search(&[1.0, 0.0, 0.0], 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_wrong_width() {
        let store = MemoryVectorStore::new(3);
        let err = store.upsert(&record("a", "x.txt", 0, vec![1.0, 0.0])).await.unwrap_err();
        assert!(matches!(err, AgribotError::DimensionMismatch { .. }));
        assert_eq!(store.document_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_stale() {
        let store = MemoryVectorStore::new(3);
        for i in 0..4 {
            store.upsert(&record(&format!("f_{i}"), "f.txt", i, vec![1.0, 0.0, 0.0])).await.unwrap();
        }
        store.upsert(&record("g_3", "g.txt", 3, vec![1.0, 0.0, 0.0])).await.unwrap();

        assert_eq!(store.delete_stale("/docs/f.txt", 2).await.unwrap(), 2);
        assert_eq!(store.document_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_delete_stale_ignores_same_name_elsewhere() {
        let store = MemoryVectorStore::new(3);
        let mut elsewhere = record("other_1", "f.txt", 1, vec![1.0, 0.0, 0.0]);
        elsewhere.metadata.path = "/archive/f.txt".to_string();
        store.upsert(&elsewhere).await.unwrap();
        store.upsert(&record("f_1", "f.txt", 1, vec![1.0, 0.0, 0.0])).await.unwrap();

        assert_eq!(store.delete_stale("/docs/f.txt", 0).await.unwrap(), 1);
        let left = store.search(&[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].metadata.path, "/archive/f.txt");
    }
}
