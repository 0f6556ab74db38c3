//! OpenAI embeddings implementation.

use super::Embedder;
use crate::error::{AgribotError, Result};
use crate::openai::{create_client, ProviderEndpoint};
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// OpenAI-based embedder.
pub struct OpenAIEmbedder {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbedder {
    /// Create a new OpenAI embedder with the default corpus model.
    pub fn new() -> Result<Self> {
        Self::with_config(&ProviderEndpoint::default(), "text-embedding-ada-002", 1536)
    }

    /// Create a new OpenAI embedder with custom endpoint, model and dimensions.
    pub fn with_config(endpoint: &ProviderEndpoint, model: &str, dimensions: usize) -> Result<Self> {
        Ok(Self {
            client: create_client(endpoint)?,
            model: model.to_string(),
            dimensions,
        })
    }

    /// Only the `text-embedding-3` family accepts a `dimensions` parameter.
    fn supports_dimensions(&self) -> bool {
        self.model.starts_with("text-embedding-3")
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    #[instrument(skip(self, text), fields(len = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| AgribotError::Provider("Empty embedding response".to_string()))
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        const BATCH_SIZE: usize = 100;
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let mut builder = CreateEmbeddingRequestArgs::default();
            builder
                .model(&self.model)
                .input(EmbeddingInput::StringArray(chunk.to_vec()));
            if self.supports_dimensions() {
                builder.dimensions(self.dimensions as u32);
            }
            let request = builder
                .build()
                .map_err(|e| AgribotError::Provider(format!("Failed to build request: {}", e)))?;

            let response = self
                .client
                .embeddings()
                .create(request)
                .await
                .map_err(|e| AgribotError::Provider(format!("Embedding API error: {}", e)))?;

            if response.data.len() != chunk.len() {
                return Err(AgribotError::Provider(format!(
                    "Embedding API returned {} vectors for {} inputs",
                    response.data.len(),
                    chunk.len()
                )));
            }

            let mut embeddings: Vec<_> = response.data.into_iter().collect();
            embeddings.sort_by_key(|e| e.index);

            for embedding_data in embeddings {
                all_embeddings.push(embedding_data.embedding);
            }
        }

        debug!("Generated {} embeddings", all_embeddings.len());
        Ok(all_embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model
    }
}
