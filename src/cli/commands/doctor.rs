//! Doctor command - verify system requirements and configuration.

use super::init::install_hint;
use crate::cli::Output;
use crate::config::{Settings, VectorStoreProvider};
use console::style;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: &str, hint: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.to_string(),
            hint: hint.map(str::to_string),
        }
    }

    fn ok(name: &str, message: &str) -> Self {
        Self::new(name, CheckStatus::Ok, message, None)
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self::new(name, CheckStatus::Warning, message, Some(hint))
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self::new(name, CheckStatus::Error, message, Some(hint))
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

fn print_section(title: &str, checks: &[CheckResult]) {
    println!("{}", style(title).bold());
    for check in checks {
        check.print();
    }
    println!();
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("AgriBot Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    // Missing extraction tools only cost the affected file types.
    let tools = vec![check_tool("pdftotext")];
    print_section("Document Tools", &tools);
    checks.extend(tools);

    let keys = vec![
        check_api_key(&settings.embedding.api_key_env, "embeddings"),
        check_api_key(&settings.chat.api_key_env, "answers"),
    ];
    print_section("API Configuration", &keys);
    checks.extend(keys);

    let storage = check_storage(settings);
    print_section("Storage", &storage);
    checks.extend(storage);

    let config = vec![check_config_file()];
    print_section("Configuration", &config);
    checks.extend(config);

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using AgriBot.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! AgriBot is ready to use.");
    }

    Ok(())
}

/// Check if an external tool is available.
fn check_tool(name: &str) -> CheckResult {
    match Command::new(name).arg("-v").output() {
        Ok(output) => {
            // pdftotext prints its version banner on stderr or stdout depending on build
            let banner = if output.stdout.is_empty() {
                output.stderr
            } else {
                output.stdout
            };
            let version = String::from_utf8_lossy(&banner)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .chars()
                .take(50)
                .collect::<String>();
            CheckResult::ok(name, &version)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::warning(name, "not found", install_hint(name))
        }
        Err(e) => CheckResult::warning(name, &format!("error: {}", e), install_hint(name)),
    }
}

/// Check that an API key variable is set, showing only a masked form.
fn check_api_key(var: &str, purpose: &str) -> CheckResult {
    let hint = format!("Set with: export {}='sk-...'", var);
    match std::env::var(var) {
        Ok(key) if key.chars().count() > 12 => {
            let chars: Vec<char> = key.chars().collect();
            let masked = format!(
                "{}...{}",
                chars[..5].iter().collect::<String>(),
                chars[chars.len() - 4..].iter().collect::<String>()
            );
            CheckResult::ok(var, &format!("configured for {} ({})", purpose, masked))
        }
        Ok(key) if key.is_empty() => CheckResult::error(var, "empty", &hint),
        Ok(_) => CheckResult::warning(var, "set but suspiciously short", &hint),
        Err(_) => CheckResult::error(var, "not set", &hint),
    }
}

/// Check data directory, databases and documents.
fn check_storage(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let data_dir = settings.data_dir();
    if data_dir.exists() {
        results.push(CheckResult::ok("Data directory", &data_dir.display().to_string()));
    } else {
        results.push(CheckResult::warning(
            "Data directory",
            &format!("{} (will be created)", data_dir.display()),
            "Directory will be created on first use",
        ));
    }

    let docs = settings.documents_dir();
    match std::fs::read_dir(&docs) {
        Ok(entries) => {
            let count = entries.filter_map(|e| e.ok()).count();
            results.push(CheckResult::ok(
                "Documents",
                &format!("{} ({} entries)", docs.display(), count),
            ));
        }
        Err(_) => results.push(CheckResult::warning(
            "Documents",
            &format!("{} not found", docs.display()),
            "Set ingest.documents_dir or pass a directory to 'agribot ingest'",
        )),
    }

    match settings.vector_store.provider {
        VectorStoreProvider::Sqlite => {
            let db_path = settings.sqlite_path();
            if db_path.exists() {
                let size = std::fs::metadata(&db_path)
                    .map(|m| format_size(m.len()))
                    .unwrap_or_else(|_| "unknown size".to_string());
                results.push(CheckResult::ok(
                    "Vector store",
                    &format!("sqlite {} ({})", db_path.display(), size),
                ));
            } else {
                results.push(CheckResult::warning(
                    "Vector store",
                    &format!("sqlite {} (not created yet)", db_path.display()),
                    "Created on first ingest",
                ));
            }
        }
        VectorStoreProvider::Postgres => match &settings.vector_store.postgres_url {
            Some(url) => {
                let host = url::Url::parse(url)
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_string))
                    .unwrap_or_else(|| "unknown host".to_string());
                results.push(CheckResult::ok("Vector store", &format!("postgres at {}", host)));
            }
            None => results.push(CheckResult::error(
                "Vector store",
                "postgres selected but no URL configured",
                "Set DATABASE_URL or vector_store.postgres_url",
            )),
        },
        VectorStoreProvider::Memory => results.push(CheckResult::warning(
            "Vector store",
            "memory (nothing is persisted)",
            "Use sqlite or postgres to keep the index between runs",
        )),
    }

    results
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &config_path.display().to_string())
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: agribot init (or agribot config edit)",
        )
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
