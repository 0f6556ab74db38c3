//! AgriBot CLI entry point.

use agribot::cli::{commands, Cli, Commands};
use agribot::config::Settings;
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("agribot={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let config_path = cli.config.as_deref().map(Settings::expand_path);
    let settings = Settings::load_from(config_path.as_ref())?;

    std::fs::create_dir_all(settings.data_dir())?;

    match cli.command {
        Commands::Init => {
            commands::run_init(&settings)?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings)?;
        }

        Commands::Ingest { dir } => {
            commands::run_ingest(dir, settings).await?;
        }

        Commands::Search { query, limit } => {
            commands::run_search(&query, limit, settings).await?;
        }

        Commands::Ask { user, query } => {
            commands::run_ask(&user, &query, settings).await?;
        }

        Commands::History { user, limit } => {
            commands::run_history(&user, limit, &settings)?;
        }

        Commands::Farmer { action } => {
            commands::run_farmer(action, &settings).await?;
        }

        Commands::Serve { host, port, ingest } => {
            commands::run_serve(&host, port, ingest, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(&action, config_path, settings)?;
        }
    }

    Ok(())
}
