//! CLI module for AgriBot.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// AgriBot - farmer knowledge base and assistant
///
/// Ingests agricultural documents into a vector store and answers farmers'
/// questions using their own field and irrigation records.
#[derive(Parser, Debug)]
#[command(name = "agribot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize AgriBot and verify system requirements
    Init,

    /// Check system requirements and configuration
    Doctor,

    /// Load, chunk and embed every document in a directory
    Ingest {
        /// Documents directory (defaults to ingest.documents_dir)
        dir: Option<String>,
    },

    /// Search the knowledge base
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5", allow_negative_numbers = true)]
        limit: i64,
    },

    /// Ask a question on behalf of a farmer
    Ask {
        /// Farmer id
        #[arg(short, long)]
        user: String,

        /// The question to ask
        query: String,
    },

    /// Show a farmer's recent questions and answers
    History {
        /// Farmer id
        #[arg(short, long)]
        user: String,

        /// Maximum number of entries
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Manage farmers, fields and irrigation records
    Farmer {
        #[command(subcommand)]
        action: FarmerAction,
    },

    /// Start HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "5000")]
        port: u16,

        /// Ingest the configured documents directory before listening
        #[arg(long)]
        ingest: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum FarmerAction {
    /// Register a farmer
    Add {
        /// Display name
        name: String,

        /// Farmer id (generated if omitted)
        #[arg(long)]
        id: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        location: Option<String>,
    },

    /// Add a field to a farmer
    Field {
        /// Farmer id
        #[arg(short, long)]
        user: String,

        /// Field name
        name: String,

        #[arg(long)]
        crop: Option<String>,

        /// Area in square metres
        #[arg(long)]
        area: Option<f64>,

        /// Current soil humidity (%)
        #[arg(long, default_value = "50")]
        humidity: f64,

        /// Irrigate automatically below this humidity (%)
        #[arg(long, default_value = "30")]
        min: f64,

        /// Upper humidity threshold (%)
        #[arg(long, default_value = "70")]
        max: f64,

        /// Minutes per irrigation run
        #[arg(long, default_value = "10")]
        duration: u32,

        /// Disable automatic irrigation
        #[arg(long)]
        manual: bool,
    },

    /// Record a humidity reading or a manual irrigation run
    Irrigate {
        /// Field id
        field_id: i64,

        /// Humidity reading (%)
        #[arg(long)]
        humidity: f64,

        /// Log a manual run of this many minutes instead of a sensor reading
        #[arg(long)]
        manual: Option<u32>,
    },

    /// Show a farmer's profile, fields and recent irrigation
    Show {
        /// Farmer id
        user: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
