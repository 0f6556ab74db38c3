//! Answer generation: farmer context plus retrieved chunks, sent to the chat model.

use super::context::{distinct_sources, format_context_for_prompt, ContextBuilder};
use crate::chat::{ChatMessage, ChatModel, CompletionOptions};
use crate::config::Prompts;
use crate::error::{AgribotError, Result};
use crate::farmer::{FarmerContext, FarmerDataSource};
use crate::vector_store::EmbeddingStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Irrigation runs included in the farmer context by default.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// An answer and the documents it drew on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagAnswer {
    pub response: String,
    /// Distinct source file names, most relevant first.
    pub sources: Vec<String>,
}

/// RAG engine for farmer questions.
pub struct RagEngine {
    context_builder: ContextBuilder,
    farmers: Arc<dyn FarmerDataSource>,
    chat: Arc<dyn ChatModel>,
    prompts: Prompts,
    history_limit: usize,
    options: CompletionOptions,
}

impl RagEngine {
    /// Create a new RAG engine with default prompts and limits.
    pub fn new(
        store: EmbeddingStore,
        farmers: Arc<dyn FarmerDataSource>,
        chat: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            context_builder: ContextBuilder::new(store),
            farmers,
            chat,
            prompts: Prompts::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            options: CompletionOptions::default(),
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_max_context_chunks(mut self, max_chunks: usize) -> Self {
        self.context_builder = self.context_builder.with_max_chunks(max_chunks);
        self
    }

    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    fn farmer_vars(context: &FarmerContext) -> Result<HashMap<String, String>> {
        let mut vars = HashMap::new();
        vars.insert("farmer_name".to_string(), context.profile.name.clone());
        vars.insert(
            "fields".to_string(),
            serde_json::to_string_pretty(&context.fields)?,
        );
        vars.insert(
            "irrigation_history".to_string(),
            serde_json::to_string_pretty(&context.irrigation_history)?,
        );
        Ok(vars)
    }

    /// Build the system and user messages for one question.
    fn build_messages(
        &self,
        context: &FarmerContext,
        query: &str,
        retrieved: &str,
    ) -> Result<Vec<ChatMessage>> {
        let system_vars = Self::farmer_vars(context)?;
        let system = self
            .prompts
            .render_with_custom(&self.prompts.rag.system, &system_vars);

        let mut user_vars = HashMap::new();
        user_vars.insert("query".to_string(), query.to_string());
        user_vars.insert("context".to_string(), retrieved.to_string());
        let user = self
            .prompts
            .render_with_custom(&self.prompts.rag.user, &user_vars);

        Ok(vec![ChatMessage::system(system), ChatMessage::user(user)])
    }

    /// Answer `query` for the farmer `user_id`.
    #[instrument(skip(self, query), fields(user_id = %user_id))]
    pub async fn answer(&self, user_id: &str, query: &str) -> Result<RagAnswer> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AgribotError::InvalidInput("Query is required".to_string()));
        }
        info!("Processing query: {}", query);

        let farmer = self
            .farmers
            .farmer_context(user_id, self.history_limit)
            .await?;

        let chunks = self.context_builder.build(query).await?;
        let retrieved = format_context_for_prompt(&chunks);
        let messages = self.build_messages(&farmer, query, &retrieved)?;

        let response = self.chat.complete(&messages, &self.options).await?;
        let sources = distinct_sources(&chunks);

        debug!("Generated response with {} sources", sources.len());
        Ok(RagAnswer { response, sources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::scripted::ScriptedChatModel;
    use crate::chat::Role;
    use crate::embedding::keyword::{FailingEmbedder, KeywordEmbedder, TEST_DIMENSIONS};
    use crate::farmer::sqlite::tests::seeded_store;
    use crate::vector_store::tests::record;
    use crate::vector_store::MemoryVectorStore;

    async fn knowledge_base() -> EmbeddingStore {
        let store = EmbeddingStore::new(
            Arc::new(KeywordEmbedder::new(TEST_DIMENSIONS)),
            Arc::new(MemoryVectorStore::new(TEST_DIMENSIONS)),
        );
        let docs = [
            ("drip_0", "drip.pdf", "Drip irrigation saves water for grapes in summer."),
            ("drip_1", "drip.pdf", "Check drip irrigation emitters for clogging weekly."),
            ("pmkisan_0", "pm-kisan.txt", "PM-KISAN pays six thousand rupees per year."),
            ("soil_0", "soil.json", "Grapes prefer well drained soil with pH near seven."),
        ];
        for (id, source, text) in docs {
            let metadata = record(id, source, 0, vec![]).metadata;
            store.upsert(id, text, metadata).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_answer_uses_farmer_context_and_sources() {
        let chat = Arc::new(ScriptedChatModel::replying("Irrigate the grape block at dawn."));
        let engine = RagEngine::new(knowledge_base().await, Arc::new(seeded_store()), chat.clone());

        let answer = engine
            .answer("farmer-1", "How often should drip irrigation run for grapes?")
            .await
            .unwrap();

        assert_eq!(answer.response, "Irrigate the grape block at dawn.");
        assert_eq!(answer.sources[0], "drip.pdf");
        assert!(answer.sources.len() <= 3);
        let mut deduped = answer.sources.clone();
        deduped.dedup();
        assert_eq!(deduped, answer.sources);

        let (messages, options) = chat.last_request().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("Farmer: Ramesh Patil"));
        assert!(messages[0].content.contains("\"name\": \"Grape block\""));
        assert!(!messages[0].content.contains("{{"));
        assert_eq!(messages[1].role, Role::User);
        assert!(messages[1]
            .content
            .contains("following query: How often should drip irrigation run for grapes?"));
        assert!(messages[1].content.contains("Source: drip.pdf\n"));
        assert_eq!(options.temperature, 0.7);
        assert_eq!(options.max_tokens, 1000);
    }

    #[tokio::test]
    async fn test_placeholder_text_in_query_reaches_model_verbatim() {
        let store = knowledge_base().await;
        let quoted = record("drip_2", "drip.pdf", 2, vec![]).metadata;
        store
            .upsert("drip_2", "Drip irrigation notes quoting {{query}} inline.", quoted)
            .await
            .unwrap();
        let chat = Arc::new(ScriptedChatModel::replying("ok"));
        let engine = RagEngine::new(store, Arc::new(seeded_store()), chat.clone());

        for _ in 0..20 {
            engine
                .answer("farmer-1", "drip irrigation literal {{context}} here")
                .await
                .unwrap();
            let (messages, _) = chat.last_request().unwrap();
            let user = &messages[1].content;
            assert!(user.contains("following query: drip irrigation literal {{context}} here"));
            assert!(user.contains("quoting {{query}} inline."));
            assert_eq!(user.matches("Source: ").count(), 3);
        }
    }

    #[tokio::test]
    async fn test_unknown_farmer_is_data_unavailable() {
        let chat = Arc::new(ScriptedChatModel::replying("unused"));
        let engine = RagEngine::new(knowledge_base().await, Arc::new(seeded_store()), chat.clone());

        let err = engine.answer("ghost", "When to sow?").await.unwrap_err();
        assert!(matches!(err, AgribotError::DataUnavailable(_)));
        assert!(chat.last_request().is_none());
    }

    #[tokio::test]
    async fn test_chat_failure_is_generation_error() {
        let engine = RagEngine::new(
            knowledge_base().await,
            Arc::new(seeded_store()),
            Arc::new(ScriptedChatModel::failing()),
        );

        let err = engine.answer("farmer-1", "drip irrigation").await.unwrap_err();
        assert!(matches!(err, AgribotError::Generation(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_embedding_failure_is_provider_error() {
        let store = EmbeddingStore::new(
            Arc::new(FailingEmbedder),
            Arc::new(MemoryVectorStore::new(TEST_DIMENSIONS)),
        );
        let chat = Arc::new(ScriptedChatModel::replying("unused"));
        let engine = RagEngine::new(store, Arc::new(seeded_store()), chat.clone());

        let err = engine.answer("farmer-1", "drip irrigation").await.unwrap_err();
        assert!(matches!(err, AgribotError::Provider(_)));
        assert!(chat.last_request().is_none());
    }

    #[tokio::test]
    async fn test_empty_query_and_empty_store() {
        let empty = EmbeddingStore::new(
            Arc::new(KeywordEmbedder::new(TEST_DIMENSIONS)),
            Arc::new(MemoryVectorStore::new(TEST_DIMENSIONS)),
        );
        let chat = Arc::new(ScriptedChatModel::replying("General advice."));
        let engine = RagEngine::new(empty, Arc::new(seeded_store()), chat.clone())
            .with_max_context_chunks(1);

        assert!(matches!(
            engine.answer("farmer-1", "  ").await,
            Err(AgribotError::InvalidInput(_))
        ));

        let answer = engine.answer("farmer-1", "What about mulching?").await.unwrap();
        assert_eq!(answer.response, "General advice.");
        assert!(answer.sources.is_empty());
    }
}
