//! Error types for AgriBot.

use std::path::PathBuf;
use thiserror::Error;

/// Library-level error type for AgriBot operations.
#[derive(Error, Debug)]
pub enum AgribotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to extract text from {path}: {message}")]
    Extraction { path: PathBuf, message: String },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Farmer data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Response generation failed: {0}")]
    Generation(String),

    #[error("Embedding has {actual} dimensions, store expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Postgres error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AgribotError {
    /// Whether the caller may reasonably retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgribotError::Provider(_) | AgribotError::Generation(_))
    }
}

/// Result type alias for AgriBot operations.
pub type Result<T> = std::result::Result<T, AgribotError>;
