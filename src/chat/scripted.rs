//! Canned chat model for tests.

use super::{ChatMessage, ChatModel, CompletionOptions};
use crate::error::{AgribotError, Result};
use async_trait::async_trait;
use std::sync::Mutex;

/// Returns a fixed reply (or error) and records every request it receives.
pub struct ScriptedChatModel {
    reply: Option<String>,
    pub requests: Mutex<Vec<(Vec<ChatMessage>, CompletionOptions)>>,
}

impl ScriptedChatModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn last_request(&self) -> Option<(Vec<ChatMessage>, CompletionOptions)> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn complete(&self, messages: &[ChatMessage], options: &CompletionOptions) -> Result<String> {
        self.requests
            .lock()
            .unwrap()
            .push((messages.to_vec(), *options));
        self.reply
            .clone()
            .ok_or_else(|| AgribotError::Generation("HTTP status 503".to_string()))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
