//! Configuration module for AgriBot.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, RagPrompts};
pub use settings::{
    ChatSettings, EmbeddingSettings, FarmerSettings, GeneralSettings, IngestSettings,
    PromptSettings, RagSettings, Settings, VectorStoreProvider, VectorStoreSettings,
};
