//! Pipeline orchestrator for AgriBot.
//!
//! Wires loader, embedding store, farmer data and chat model together from
//! [`Settings`], and runs ingestion and question answering on top of them.

use crate::chat::{ChatModel, CompletionOptions, OpenAIChatModel};
use crate::config::{Prompts, Settings, VectorStoreProvider};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{AgribotError, Result};
use crate::farmer::{ConversationEntry, SqliteFarmerStore};
use crate::loader::{ChunkingConfig, DocumentLoader};
use crate::openai::ProviderEndpoint;
use crate::rag::{RagAnswer, RagEngine};
use crate::vector_store::{
    EmbeddingStore, MemoryVectorStore, PgVectorOptions, PgVectorStore, QueryResult,
    SqliteVectorStore, VectorStore,
};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// The main orchestrator for the AgriBot pipeline.
pub struct Orchestrator {
    settings: Settings,
    loader: DocumentLoader,
    store: EmbeddingStore,
    farmers: Arc<SqliteFarmerStore>,
    rag: RagEngine,
}

/// A file that could not be ingested.
#[derive(Debug, Clone, Serialize)]
pub struct IngestFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Result of ingesting a directory.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    /// Files whose chunks were all stored.
    pub loaded_files: Vec<PathBuf>,
    /// Unsupported or empty files.
    pub skipped: Vec<PathBuf>,
    /// Files whose text could not be extracted.
    pub failures: Vec<IngestFailure>,
    pub chunks_indexed: usize,
    /// Chunks removed because their file got shorter.
    pub stale_removed: usize,
}

enum FileOutcome {
    Indexed { chunks: usize, stale_removed: usize },
    Empty,
}

/// Open the vector backend named by the settings.
pub async fn open_vector_store(settings: &Settings) -> Result<Arc<dyn VectorStore>> {
    let dimensions = settings.embedding.dimensions as usize;
    let vs = &settings.vector_store;

    let store: Arc<dyn VectorStore> = match vs.provider {
        VectorStoreProvider::Sqlite => Arc::new(SqliteVectorStore::new(&settings.sqlite_path(), dimensions)?),
        VectorStoreProvider::Postgres => {
            let url = vs.postgres_url.as_deref().ok_or_else(|| {
                AgribotError::Config(
                    "vector_store.postgres_url (or DATABASE_URL) is required for the postgres provider"
                        .to_string(),
                )
            })?;
            let options = PgVectorOptions {
                pool_size: vs.pool_size,
                ivfflat_lists: vs.ivfflat_lists,
                ivfflat_probes: vs.ivfflat_probes,
            };
            Arc::new(PgVectorStore::open(url, dimensions, options).await?)
        }
        VectorStoreProvider::Memory => {
            warn!("Using the in-memory vector store; nothing will be persisted");
            Arc::new(MemoryVectorStore::new(dimensions))
        }
    };

    Ok(store)
}

impl Orchestrator {
    /// Create an orchestrator from settings, connecting to the configured providers.
    pub async fn new(settings: Settings) -> Result<Self> {
        // Load prompts (with optional custom directory and variables)
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let loader = DocumentLoader::new(ChunkingConfig::new(
            settings.ingest.max_chunk_size,
            settings.ingest.overlap,
        )?);

        let embedding_endpoint = ProviderEndpoint::new(
            &settings.embedding.api_base,
            &settings.embedding.api_key_env,
            settings.embedding.timeout_secs,
        );
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::with_config(
            &embedding_endpoint,
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        )?);

        let chat_endpoint = ProviderEndpoint::new(
            &settings.chat.api_base,
            &settings.chat.api_key_env,
            settings.chat.timeout_secs,
        );
        let chat: Arc<dyn ChatModel> = Arc::new(OpenAIChatModel::new(&chat_endpoint, &settings.chat.model)?);

        let backend = open_vector_store(&settings).await?;
        let farmers = Arc::new(SqliteFarmerStore::new(&settings.farmer_db_path())?);

        info!(
            "Using {} vector store with {} ({} dims) and chat model {}",
            settings.vector_store.provider,
            settings.embedding.model,
            settings.embedding.dimensions,
            settings.chat.model
        );

        Ok(Self::with_components(settings, prompts, loader, embedder, backend, farmers, chat))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        loader: DocumentLoader,
        embedder: Arc<dyn Embedder>,
        backend: Arc<dyn VectorStore>,
        farmers: Arc<SqliteFarmerStore>,
        chat: Arc<dyn ChatModel>,
    ) -> Self {
        let store = EmbeddingStore::new(embedder, backend);
        let rag = RagEngine::new(store.clone(), farmers.clone(), chat)
            .with_prompts(prompts)
            .with_max_context_chunks(settings.rag.max_context_chunks)
            .with_history_limit(settings.farmer.history_limit)
            .with_options(CompletionOptions {
                temperature: settings.chat.temperature,
                max_tokens: settings.chat.max_tokens,
            });

        Self {
            settings,
            loader,
            store,
            farmers,
            rag,
        }
    }

    /// Create the vector schema if needed.
    pub async fn initialize(&self) -> Result<()> {
        self.store.backend().initialize().await
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &EmbeddingStore {
        &self.store
    }

    pub fn farmers(&self) -> &Arc<SqliteFarmerStore> {
        &self.farmers
    }

    /// Ingest the configured documents directory.
    pub async fn ingest_configured(&self) -> Result<IngestReport> {
        self.ingest_directory(&self.settings.documents_dir()).await
    }

    /// Load, embed and store every supported file in `dir`.
    ///
    /// A file that cannot be extracted is reported and skipped. Provider and
    /// storage errors stop the run, since every later file would fail the same way.
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub async fn ingest_directory(&self, dir: &Path) -> Result<IngestReport> {
        let (files, skipped) = self.loader.list_files(dir).await?;
        let mut report = IngestReport {
            skipped,
            ..Default::default()
        };

        info!("Ingesting {} files from {}", files.len(), dir.display());

        let mut stream = stream::iter(files)
            .map(|path| async move {
                let result = self.ingest_file(&path).await;
                (path, result)
            })
            .buffer_unordered(self.settings.ingest.max_concurrent_files.max(1));

        while let Some((path, result)) = stream.next().await {
            match result {
                Ok(FileOutcome::Indexed { chunks, stale_removed }) => {
                    report.chunks_indexed += chunks;
                    report.stale_removed += stale_removed;
                    report.loaded_files.push(path);
                }
                Ok(FileOutcome::Empty) => report.skipped.push(path),
                Err(e @ (AgribotError::Extraction { .. } | AgribotError::Io(_))) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    report.failures.push(IngestFailure {
                        path,
                        error: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Ingestion stopped at {}: {}", path.display(), e);
                    return Err(e);
                }
            }
        }

        report.loaded_files.sort();
        report.skipped.sort();

        info!(
            "Indexed {} chunks from {} files ({} skipped, {} failed)",
            report.chunks_indexed,
            report.loaded_files.len(),
            report.skipped.len(),
            report.failures.len()
        );
        Ok(report)
    }

    async fn ingest_file(&self, path: &Path) -> Result<FileOutcome> {
        let chunks = self.loader.load_file(path).await?;
        let Some(first) = chunks.first() else {
            return Ok(FileOutcome::Empty);
        };
        let source_path = first.metadata.path.clone();

        for chunk in &chunks {
            self.store.upsert_chunk(chunk).await?;
        }
        let stale_removed = self.store.delete_stale(&source_path, chunks.len()).await?;

        Ok(FileOutcome::Indexed {
            chunks: chunks.len(),
            stale_removed,
        })
    }

    /// Answer a farmer's question and record it in the conversation log.
    pub async fn answer(&self, user_id: &str, query: &str) -> Result<RagAnswer> {
        let answer = self.rag.answer(user_id, query).await?;

        if self.settings.rag.log_conversations {
            if let Err(e) = self.farmers.log_conversation(
                user_id,
                query.trim(),
                &answer.response,
                &answer.sources,
            ) {
                warn!("Failed to log conversation for {}: {}", user_id, e);
            }
        }

        Ok(answer)
    }

    /// Semantic search over the stored chunks.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<QueryResult>> {
        self.store.search(query, limit).await
    }

    /// Most recent conversations of a farmer.
    pub fn history(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationEntry>> {
        self.farmers.conversation_history(user_id, limit)
    }

    /// Release backend connections.
    pub async fn close(&self) -> Result<()> {
        self.store.backend().close().await
    }
}
