//! CLI commands and argument parsing

use crate::config::Overrides;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Resumable batch harvester for paginated web APIs
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Job file (YAML)
    #[arg(short, long, global = true, default_value = "harvest.yaml")]
    pub config: PathBuf,

    /// Output format for reports
    #[arg(short, long, global = true, default_value = "pretty")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Harvest every required unit not yet completed
    Run {
        /// Requested page size (capped by the source's maximum)
        #[arg(long)]
        page_size: Option<u32>,

        /// Items between flushes of the output and the checkpoint
        #[arg(long)]
        flush_interval: Option<usize>,

        /// Delay between page requests in milliseconds
        #[arg(long)]
        request_delay_ms: Option<u64>,
    },

    /// Show which units a run would harvest
    Plan,

    /// Summarize the checkpoint
    Status,

    /// Check the job file and its declarations
    Validate,
}

impl Commands {
    /// Configuration overrides carried by this command
    pub fn overrides(&self) -> Overrides {
        match self {
            Commands::Run {
                page_size,
                flush_interval,
                request_delay_ms,
            } => Overrides {
                page_size: *page_size,
                flush_interval: *flush_interval,
                request_delay_ms: *request_delay_ms,
            },
            _ => Overrides::default(),
        }
    }
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// One JSON document per line
    Json,
    /// Indented JSON
    Pretty,
}
