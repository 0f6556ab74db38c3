//! Configuration settings for AgriBot.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub embedding: EmbeddingSettings,
    pub chat: ChatSettings,
    pub ingest: IngestSettings,
    pub vector_store: VectorStoreSettings,
    pub farmer: FarmerSettings,
    pub rag: RagSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.agribot".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Embedding provider settings.
///
/// The model is pinned per corpus: changing it requires re-ingesting every document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// OpenAI-compatible API base URL.
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: "text-embedding-ada-002".to_string(),
            dimensions: 1536,
            timeout_secs: 60,
        }
    }
}

/// Chat completion provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// OpenAI-compatible API base URL.
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Chat model to use.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.deepseek.com/v1".to_string(),
            api_key_env: "DEEPSEEK_API_KEY".to_string(),
            model: "deepseek-chat".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            timeout_secs: 60,
        }
    }
}

/// Document ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Directory of documents to ingest.
    pub documents_dir: String,
    /// Maximum chunk size in characters.
    pub max_chunk_size: usize,
    /// Characters repeated at the start of each chunk after the first.
    pub overlap: usize,
    /// Maximum number of files processed concurrently.
    pub max_concurrent_files: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            documents_dir: "./data/government_docs".to_string(),
            max_chunk_size: 1000,
            overlap: 200,
            max_concurrent_files: 2,
        }
    }
}

/// Vector store backend.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreProvider {
    /// Local SQLite file with exact cosine scan (default).
    #[default]
    Sqlite,
    /// PostgreSQL with the pgvector extension and an IVFFlat index.
    Postgres,
    /// Process-local map, nothing persisted.
    Memory,
}

impl std::str::FromStr for VectorStoreProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(VectorStoreProvider::Sqlite),
            "postgres" | "postgresql" | "pgvector" => Ok(VectorStoreProvider::Postgres),
            "memory" => Ok(VectorStoreProvider::Memory),
            _ => Err(format!("Unknown vector store provider: {}", s)),
        }
    }
}

impl std::fmt::Display for VectorStoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorStoreProvider::Sqlite => write!(f, "sqlite"),
            VectorStoreProvider::Postgres => write!(f, "postgres"),
            VectorStoreProvider::Memory => write!(f, "memory"),
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Vector store provider (sqlite, postgres, memory).
    pub provider: VectorStoreProvider,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
    /// Postgres connection URL (for postgres provider). `DATABASE_URL` overrides it.
    pub postgres_url: Option<String>,
    /// Maximum Postgres pool connections.
    pub pool_size: u32,
    /// Number of IVFFlat lists created with the index.
    pub ivfflat_lists: u32,
    /// Number of IVFFlat lists probed per query.
    pub ivfflat_probes: u32,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            provider: VectorStoreProvider::Sqlite,
            sqlite_path: "~/.agribot/vectors.db".to_string(),
            postgres_url: None,
            pool_size: 5,
            ivfflat_lists: 100,
            ivfflat_probes: 10,
        }
    }
}

/// Farmer data settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmerSettings {
    /// Path to the farmer SQLite database.
    pub sqlite_path: String,
    /// Number of recent irrigation events included in the prompt.
    pub history_limit: usize,
}

impl Default for FarmerSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.agribot/farmers.db".to_string(),
            history_limit: 10,
        }
    }
}

/// RAG (Retrieval-Augmented Generation) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// Number of retrieved chunks included in the prompt.
    pub max_context_chunks: usize,
    /// Store each answered query in the conversation log.
    pub log_conversations: bool,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            max_context_chunks: 3,
            log_conversations: true,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Settings>(&content)?
        } else {
            Settings::default()
        };

        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                settings.vector_store.postgres_url = Some(url);
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Check values that would otherwise fail deep inside a pipeline run.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::AgribotError;

        if self.embedding.dimensions == 0 {
            return Err(AgribotError::Config("embedding.dimensions must be positive".into()));
        }
        if self.ingest.max_concurrent_files == 0 {
            return Err(AgribotError::Config(
                "ingest.max_concurrent_files must be at least 1".into(),
            ));
        }
        for (key, base) in [
            ("embedding.api_base", &self.embedding.api_base),
            ("chat.api_base", &self.chat.api_base),
        ] {
            url::Url::parse(base)
                .map_err(|e| AgribotError::Config(format!("{} is not a valid URL: {}", key, e)))?;
        }
        if let Some(pg) = &self.vector_store.postgres_url {
            url::Url::parse(pg).map_err(|e| {
                AgribotError::Config(format!("vector_store.postgres_url is not a valid URL: {}", e))
            })?;
        }
        Ok(())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::AgribotError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("agribot")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded documents directory path.
    pub fn documents_dir(&self) -> PathBuf {
        Self::expand_path(&self.ingest.documents_dir)
    }

    /// Get the expanded vector SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.sqlite_path)
    }

    /// Get the expanded farmer SQLite database path.
    pub fn farmer_db_path(&self) -> PathBuf {
        Self::expand_path(&self.farmer.sqlite_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pipeline_values() {
        let settings = Settings::default();
        assert_eq!(settings.ingest.max_chunk_size, 1000);
        assert_eq!(settings.ingest.overlap, 200);
        assert_eq!(settings.embedding.dimensions, 1536);
        assert_eq!(settings.rag.max_context_chunks, 3);
        assert_eq!(settings.chat.max_tokens, 1000);
        assert!((settings.chat.temperature - 0.7).abs() < f32::EPSILON);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [vector_store]
            provider = "postgres"
            postgres_url = "postgres://localhost/agribot"

            [ingest]
            overlap = 100
            "#,
        )
        .unwrap();

        assert_eq!(settings.vector_store.provider, VectorStoreProvider::Postgres);
        assert_eq!(settings.ingest.overlap, 100);
        assert_eq!(settings.ingest.max_chunk_size, 1000);
        assert_eq!(settings.chat.model, "deepseek-chat");
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut settings = Settings::default();
        settings.chat.api_base = "not a url".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("pgvector".parse::<VectorStoreProvider>(), Ok(VectorStoreProvider::Postgres));
        assert!("lance".parse::<VectorStoreProvider>().is_err());
    }
}
