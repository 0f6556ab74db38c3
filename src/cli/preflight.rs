//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and configuration are available
//! before starting operations that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{AgribotError, Result};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Ingestion needs the embedding key; the PDF tool is checked but optional.
    Ingest,
    /// Answering needs both the embedding and the chat key.
    Ask,
    /// Search needs the embedding key.
    Search,
}

/// Run pre-flight checks for the given operation.
///
/// Returns the names of missing optional tools, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<Vec<String>> {
    let mut missing_tools = Vec::new();
    match operation {
        Operation::Ingest => {
            check_api_key(&settings.embedding.api_key_env)?;
            if check_tool("pdftotext").is_err() {
                missing_tools.push("pdftotext".to_string());
            }
        }
        Operation::Ask => {
            check_api_key(&settings.embedding.api_key_env)?;
            check_api_key(&settings.chat.api_key_env)?;
        }
        Operation::Search => {
            check_api_key(&settings.embedding.api_key_env)?;
        }
    }
    Ok(missing_tools)
}

/// Check that the environment variable holding an API key is set.
pub fn check_api_key(var: &str) -> Result<()> {
    match std::env::var(var) {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(AgribotError::Config(format!(
            "{var} is empty. Set it with: export {var}='sk-...'"
        ))),
        Err(_) => Err(AgribotError::Config(format!(
            "{var} not set. Set it with: export {var}='sk-...'"
        ))),
    }
}

/// Check if an external tool is available.
pub fn check_tool(name: &str) -> Result<()> {
    // pdftotext prints its version for -v
    match Command::new(name).arg("-v").output() {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(AgribotError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(AgribotError::ToolNotFound(format!("{}: {}", name, e))),
    }
}
