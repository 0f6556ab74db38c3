//! Chat completions over an OpenAI-compatible API (DeepSeek by default).

use super::{ChatMessage, ChatModel, CompletionOptions, Role};
use crate::error::{AgribotError, Result};
use crate::openai::{create_client, ProviderEndpoint};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Chat model reached through async-openai.
pub struct OpenAIChatModel {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
}

fn generation_error(e: impl std::fmt::Display) -> AgribotError {
    AgribotError::Generation(e.to_string())
}

impl OpenAIChatModel {
    pub fn new(endpoint: &ProviderEndpoint, model: &str) -> Result<Self> {
        Ok(Self {
            client: create_client(endpoint)?,
            model: model.to_string(),
        })
    }

    fn to_request_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
        let content = message.content.clone();
        let request_message = match message.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(content)
                .build()
                .map_err(generation_error)?
                .into(),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(content)
                .build()
                .map_err(generation_error)?
                .into(),
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(content)
                .build()
                .map_err(generation_error)?
                .into(),
        };
        Ok(request_message)
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    #[instrument(skip(self, messages), fields(model = %self.model, messages = messages.len()))]
    async fn complete(&self, messages: &[ChatMessage], options: &CompletionOptions) -> Result<String> {
        let messages = messages
            .iter()
            .map(Self::to_request_message)
            .collect::<Result<Vec<_>>>()?;

        // DeepSeek still expects `max_tokens` rather than `max_completion_tokens`.
        #[allow(deprecated)]
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(options.temperature)
            .max_tokens(options.max_tokens)
            .build()
            .map_err(generation_error)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| AgribotError::Generation(format!("Chat API error: {}", e)))?;

        let answer = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AgribotError::Generation("Empty response from chat model".to_string()))?;

        debug!("Generated {} characters", answer.len());
        Ok(answer)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
