mod api;
mod checks;
mod cli;
mod config;
mod console;
mod identity;
mod jobs;
mod ledger;
mod operations;
mod state;
mod utils;

pub use cli::Cli;
pub use utils::logging::setup_logging;

pub type TaskHandles = std::sync::Arc<tokio::sync::Mutex<Vec<tokio::task::JoinHandle<()>>>>;
