//! Deterministic embedders for tests.

use super::Embedder;
use crate::error::{AgribotError, Result};
use async_trait::async_trait;

/// Width used by test fixtures. Wide enough that fixture vocabularies don't share buckets.
pub const TEST_DIMENSIONS: usize = 1024;

const STOPWORDS: &[&str] = &["a", "an", "and", "the", "of", "on", "in", "for", "to", "is", "with"];

/// Bag-of-words embedder: each word bumps one FNV-hashed bucket.
/// Texts sharing words get positive cosine similarity, disjoint texts get zero.
pub struct KeywordEmbedder {
    dimensions: usize,
}

impl KeywordEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn bucket(&self, word: &str) -> usize {
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in word.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        (hash % self.dimensions as u64) as usize
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .map(|w| w.to_lowercase())
            .filter(|w| !w.is_empty() && !STOPWORDS.contains(&w.as_str()))
        {
            vector[self.bucket(&word)] += 1.0;
        }
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        "keyword-test"
    }
}

/// Embedder whose provider is always down.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(AgribotError::Provider("connection refused".to_string()))
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(AgribotError::Provider("connection refused".to_string()))
    }

    fn dimensions(&self) -> usize {
        TEST_DIMENSIONS
    }

    fn model(&self) -> &str {
        "failing-test"
    }
}
