//! Resumable batch extraction over groups of SIR documents.

pub mod config;
pub mod error;
pub mod group;
pub mod process;
pub mod prompt;
pub mod runner;
pub mod state;

pub use config::BatchConfig;
pub use error::ProcessError;
pub use group::{Groups, group_by_top_folder};
pub use process::{Processed, process_file};
pub use prompt::PromptSource;
pub use runner::{BatchRunner, RunOutcome, RunReport};
pub use state::RunState;
