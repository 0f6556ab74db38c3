//! RAG (Retrieval-Augmented Generation) for farmer questions.
//!
//! Combines what the farmer's own records say with the most relevant document
//! chunks and asks the chat model for an answer with sources.

pub mod context;
mod response;

pub use context::ContextBuilder;
pub use response::{RagAnswer, RagEngine, DEFAULT_HISTORY_LIMIT};
