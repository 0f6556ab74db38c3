//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{IngestReport, Orchestrator};
use anyhow::Result;

/// Run the ingest command.
pub async fn run_ingest(dir: Option<String>, settings: Settings) -> Result<()> {
    match preflight::check(Operation::Ingest, &settings) {
        Ok(missing) => {
            for tool in missing {
                Output::warning(&format!(
                    "{} not found; files that need it will be reported as failures.",
                    tool
                ));
            }
        }
        Err(e) => {
            Output::error(&format!("{}", e));
            Output::info("Run 'agribot doctor' for detailed diagnostics.");
            return Err(e.into());
        }
    }

    let dir = dir
        .map(|d| Settings::expand_path(&d))
        .unwrap_or_else(|| settings.documents_dir());
    if !dir.is_dir() {
        anyhow::bail!("Documents directory not found: {}", dir.display());
    }

    let orchestrator = Orchestrator::new(settings).await?;
    orchestrator.initialize().await?;

    let spinner = Output::spinner(&format!("Ingesting {}...", dir.display()));
    let result = orchestrator.ingest_directory(&dir).await;
    spinner.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            Output::error(&format!("Ingestion failed: {}", e));
            if e.is_retryable() {
                Output::info("The provider may be temporarily unavailable; re-running is safe.");
            }
            orchestrator.close().await?;
            return Err(e.into());
        }
    };

    print_report(&report);
    orchestrator.close().await?;
    Ok(())
}

fn print_report(report: &IngestReport) {
    Output::success(&format!(
        "Indexed {} chunks from {} files",
        report.chunks_indexed,
        report.loaded_files.len()
    ));
    if report.stale_removed > 0 {
        Output::kv("Stale chunks removed", &report.stale_removed.to_string());
    }

    if !report.skipped.is_empty() {
        Output::header("Skipped");
        for path in &report.skipped {
            Output::list_item(&path.display().to_string());
        }
    }

    if !report.failures.is_empty() {
        Output::header("Failed");
        for failure in &report.failures {
            Output::list_item(&format!("{}: {}", failure.path.display(), failure.error));
        }
    }
}
