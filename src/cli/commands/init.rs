//! Init command - interactive first-run setup.

use crate::cli::preflight;
use crate::cli::Output;
use crate::config::Settings;
use console::style;
use std::io::{self, Write};

/// Run the init command for first-time setup.
pub fn run_init(settings: &Settings) -> anyhow::Result<()> {
    Output::header("AgriBot Setup");
    println!();
    println!("Welcome to AgriBot! Let's make sure everything is configured correctly.\n");

    // Step 1: document extraction tools
    println!("{}", style("Step 1: Checking document tools").bold().cyan());
    println!();

    let missing: Vec<&str> = ["pdftotext"]
        .into_iter()
        .filter(|tool| preflight::check_tool(tool).is_err())
        .collect();

    if missing.is_empty() {
        Output::success("PDF extraction tools are installed!");
    } else {
        Output::warning("Some tools are missing. PDF files will be skipped until they are installed:");
        println!();
        for tool in &missing {
            println!("  {} {} - not found", style("✗").red(), style(tool).bold());
            println!("    {} {}", style("→").dim(), style(install_hint(tool)).dim());
        }
        println!();

        if !prompt_continue("Continue anyway?")? {
            println!();
            Output::info("Setup cancelled. Install the missing tools and run 'agribot init' again.");
            return Ok(());
        }
    }

    println!();

    // Step 2: API keys
    println!("{}", style("Step 2: Checking API configuration").bold().cyan());
    println!();

    for (purpose, var, url) in [
        ("embeddings", &settings.embedding.api_key_env, "https://platform.openai.com/api-keys"),
        ("answers", &settings.chat.api_key_env, "https://platform.deepseek.com/api_keys"),
    ] {
        if preflight::check_api_key(var).is_ok() {
            Output::success(&format!("{} is configured ({}).", var, purpose));
            continue;
        }

        Output::warning(&format!("{} environment variable is not set.", var));
        println!();
        println!("  AgriBot uses it for {}.", purpose);
        println!("  Get a key from: {}", style(url).underlined());
        println!("  {}", style(format!("export {}='sk-...'", var)).green());
        println!();

        if !prompt_continue("Continue without this key?")? {
            println!();
            Output::info("Setup cancelled. Set your API key and run 'agribot init' again.");
            return Ok(());
        }
    }

    println!();

    // Step 3: directories
    println!("{}", style("Step 3: Setting up directories").bold().cyan());
    println!();

    for (label, dir) in [
        ("Data directory", settings.data_dir()),
        ("Documents directory", settings.documents_dir()),
    ] {
        if dir.exists() {
            Output::info(&format!("{} exists: {}", label, dir.display()));
        } else {
            std::fs::create_dir_all(&dir)?;
            Output::success(&format!("Created {}: {}", label.to_lowercase(), dir.display()));
        }
    }

    println!();

    // Step 4: config file
    println!("{}", style("Step 4: Configuration file").bold().cyan());
    println!();

    let config_path = Settings::default_config_path();
    if config_path.exists() {
        Output::info(&format!("Config file exists: {}", config_path.display()));
    } else if prompt_continue("Create default configuration file?")? {
        settings.save_to(&config_path)?;
        Output::success(&format!("Created config file: {}", config_path.display()));
        println!();
        println!("  Edit your config with: {}", style("agribot config edit").green());
    } else {
        Output::info("Skipped config file creation. Using defaults.");
    }

    println!();

    println!("{}", style("Setup Complete!").bold().green());
    println!();
    println!("Next steps:");
    println!("  {} Check system status", style("agribot doctor").cyan());
    println!("  {} Index your documents", style("agribot ingest").cyan());
    println!("  {} Register a farmer", style("agribot farmer add \"<name>\"").cyan());
    println!(
        "  {} Ask a question",
        style("agribot ask --user <id> \"<question>\"").cyan()
    );
    println!();
    println!("For more help: {}", style("agribot --help").cyan());

    Ok(())
}

/// Get platform-specific install hint.
pub(crate) fn install_hint(tool: &str) -> &'static str {
    match tool {
        "pdftotext" => {
            if cfg!(target_os = "macos") {
                "Install with: brew install poppler"
            } else if cfg!(target_os = "linux") {
                "Install with: sudo apt install poppler-utils"
            } else {
                "Install from: https://poppler.freedesktop.org"
            }
        }
        _ => "Check the documentation for installation instructions",
    }
}

/// Prompt user for yes/no confirmation.
fn prompt_continue(message: &str) -> io::Result<bool> {
    print!("{} {} ", style("?").cyan(), message);
    print!("{} ", style("[y/N]").dim());
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let answer = input.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}
