//! CLI module
//!
//! Command-line interface for running harvest jobs.
//!
//! # Commands
//!
//! - `run` - Harvest every required unit not yet completed
//! - `plan` - Show which units a run would harvest
//! - `status` - Summarize the checkpoint
//! - `validate` - Check the job file and its declarations

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
