//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::AgribotError;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(user_id: &str, query: &str, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'agribot doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings).await?;
    orchestrator.initialize().await?;

    let spinner = Output::spinner("Searching knowledge base...");
    let result = orchestrator.answer(user_id, query).await;
    spinner.finish_and_clear();

    match result {
        Ok(answer) => {
            println!("\n{}\n", answer.response);

            if !answer.sources.is_empty() {
                Output::header("Sources");
                for source in &answer.sources {
                    Output::list_item(source);
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to generate answer: {}", e));
            if matches!(e, AgribotError::DataUnavailable(_)) {
                Output::info("Register the farmer first with 'agribot farmer add'.");
            }
            return Err(e.into());
        }
    }

    orchestrator.close().await?;
    Ok(())
}
