// Allow common clippy pedantic lints
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::unused_async)]

//! Harvester CLI
//!
//! Command-line interface for running harvest jobs

use clap::Parser;
use harvester::cli::{Cli, Runner};
use tracing::Level;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging (RUST_LOG wins over -v)
    let default_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let runner = Runner::new(cli);

    if let Err(e) = runner.run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
