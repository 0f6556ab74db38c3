//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::vector_store::validate_limit;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(query: &str, limit: i64, settings: Settings) -> Result<()> {
    let limit = validate_limit(limit)?;

    if let Err(e) = preflight::check(Operation::Search, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'agribot doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings).await?;
    orchestrator.initialize().await?;

    let spinner = Output::spinner("Searching...");
    let results = orchestrator.search(query, limit).await;
    spinner.finish_and_clear();

    match results {
        Ok(results) if results.is_empty() => {
            Output::warning("No results found matching your query.");
        }
        Ok(results) => {
            Output::success(&format!("Found {} results", results.len()));
            for result in &results {
                Output::search_result(
                    &result.metadata.source,
                    result.metadata.chunk_index,
                    result.metadata.total_chunks,
                    result.similarity,
                    &result.text,
                );
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    orchestrator.close().await?;
    Ok(())
}
