//! History command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::farmer::SqliteFarmerStore;
use anyhow::Result;

/// Show a farmer's most recent conversations, newest first.
pub fn run_history(user_id: &str, limit: usize, settings: &Settings) -> Result<()> {
    let store = SqliteFarmerStore::new(&settings.farmer_db_path())?;
    let entries = store.conversation_history(user_id, limit)?;

    if entries.is_empty() {
        Output::info(&format!("No conversations recorded for {}.", user_id));
        return Ok(());
    }

    Output::header(&format!("Conversations for {}", user_id));
    for entry in &entries {
        println!();
        Output::kv("Asked", &entry.created_at.format("%Y-%m-%d %H:%M").to_string());
        Output::kv("Question", &entry.query);
        println!("  {}", entry.response);
        if !entry.sources.is_empty() {
            Output::kv("Sources", &entry.sources.join(", "));
        }
    }

    Ok(())
}
