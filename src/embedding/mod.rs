//! Embedding generation for semantic search and retrieval.

mod openai;

#[cfg(test)]
pub(crate) mod keyword;

pub use openai::OpenAIEmbedder;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for embedding generation.
///
/// Ingestion and query must go through the same implementation and model,
/// otherwise similarity scores are meaningless.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Name of the model producing the vectors.
    fn model(&self) -> &str;
}
