//! CLI command implementations.

mod ask;
mod config;
mod doctor;
mod farmer;
mod history;
mod ingest;
mod init;
mod search;
mod serve;

pub use ask::run_ask;
pub use config::run_config;
pub use doctor::run_doctor;
pub use farmer::run_farmer;
pub use history::run_history;
pub use ingest::run_ingest;
pub use init::run_init;
pub use search::run_search;
pub use serve::run_serve;
