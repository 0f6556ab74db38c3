//! AgriBot - farmer knowledge base and assistant
//!
//! Turns a folder of agricultural documents (government schemes, crop guides,
//! irrigation manuals) into a searchable vector index, and answers farmers'
//! questions by combining retrieved passages with each farmer's own field and
//! irrigation records.
//!
//! # Architecture
//!
//! - `loader` - Text extraction and overlapping chunking
//! - `embedding` - Embedding generation
//! - `vector_store` - Vector backends (SQLite, Postgres/pgvector, memory) and the embedding store
//! - `farmer` - Farmer profiles, fields, irrigation and conversation records
//! - `chat` - Chat completion models
//! - `rag` - Context retrieval and response assembly
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use agribot::config::Settings;
//! use agribot::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings).await?;
//!     orchestrator.initialize().await?;
//!
//!     let report = orchestrator.ingest_configured().await?;
//!     println!("Indexed {} chunks", report.chunks_indexed);
//!
//!     let answer = orchestrator.answer("farmer-1", "When should I irrigate my grapes?").await?;
//!     println!("{}", answer.response);
//!
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod farmer;
pub mod loader;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod vector_store;

pub use error::{AgribotError, Result};
