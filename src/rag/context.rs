//! Context building for RAG responses.

use crate::error::Result;
use crate::vector_store::{EmbeddingStore, QueryResult};

/// Retrieves the chunks that go into a prompt.
pub struct ContextBuilder {
    store: EmbeddingStore,
    max_chunks: usize,
}

impl ContextBuilder {
    pub fn new(store: EmbeddingStore) -> Self {
        Self {
            store,
            max_chunks: 3,
        }
    }

    /// Set the maximum number of context chunks.
    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = max_chunks;
        self
    }

    pub fn max_chunks(&self) -> usize {
        self.max_chunks
    }

    /// Build context for a query.
    pub async fn build(&self, query: &str) -> Result<Vec<QueryResult>> {
        self.store.search(query, self.max_chunks).await
    }
}

/// Format retrieved chunks for the prompt: `Source: <file>` over the chunk text,
/// chunks separated by a blank line.
pub fn format_context_for_prompt(chunks: &[QueryResult]) -> String {
    chunks
        .iter()
        .map(|chunk| format!("Source: {}\n{}", chunk.metadata.source, chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Source file names in rank order, first occurrence only.
pub fn distinct_sources(chunks: &[QueryResult]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for chunk in chunks {
        if !sources.contains(&chunk.metadata.source) {
            sources.push(chunk.metadata.source.clone());
        }
    }
    sources
}
