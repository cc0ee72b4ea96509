//! CLI runner - executes commands

use crate::checkpoint::CheckpointStore;
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::HarvestConfig;
use crate::engine::{Harvester, Interrupt};
use crate::error::Result;
use crate::http::HttpPageFetcher;
use crate::output::{scan_completed_units, CsvSink, OutputRecord};
use crate::planner::{self, UnitKey, WorkUnit};
use crate::source::PaginatedSource;
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        let config = self.load_config()?;
        match &self.cli.command {
            Commands::Run { .. } => self.harvest(&config).await,
            Commands::Plan => self.plan(&config).await,
            Commands::Status => self.status(&config).await,
            Commands::Validate => self.validate(&config),
        }
    }

    /// Load the job file and apply command-line overrides
    fn load_config(&self) -> Result<HarvestConfig> {
        let mut config = HarvestConfig::load(&self.cli.config)?;
        config.apply_overrides(&self.cli.command.overrides())?;
        Ok(config)
    }

    /// Required units and the units already present in the output
    fn inputs(&self, config: &HarvestConfig) -> Result<(Vec<WorkUnit>, HashSet<UnitKey>)> {
        let required = config.declarations()?.required_units();
        let in_output = scan_completed_units(&config.output.path, &config.scan_columns())?;
        info!(
            "{} required units, {} found in {}",
            required.len(),
            in_output.len(),
            config.output.path.display()
        );
        Ok((required, in_output))
    }

    fn harvester(&self, config: &HarvestConfig) -> Result<Harvester<HttpPageFetcher>> {
        let fetcher = HttpPageFetcher::with_config(config.fetcher_config())?;
        let source = PaginatedSource::new(fetcher)
            .with_config(config.source_config())
            .with_pagination(config.pagination());

        Ok(
            Harvester::new(source, CheckpointStore::new(&config.checkpoint))
                .with_transform(config.transform.clone())
                .with_options(config.harvest_options()),
        )
    }

    /// Harvest the remaining units
    async fn harvest(&self, config: &HarvestConfig) -> Result<()> {
        let start = Instant::now();
        let (required, in_output) = self.inputs(config)?;

        let interrupt = Interrupt::new();
        let harvester = self.harvester(config)?.with_interrupt(interrupt.clone());
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after the current item (press Ctrl-C again to abort)");
                interrupt.trigger();
            }
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Second interrupt received, aborting without a final flush");
                std::process::exit(130);
            }
        });

        let mut sink: CsvSink<OutputRecord> = CsvSink::open(&config.output.path)?;
        info!("Starting job '{}'", config.name);
        let report = harvester.run(&required, &in_output, &mut sink).await?;

        if !report.failed_units.is_empty() {
            warn!(
                "{} units failed and will be retried on the next run",
                report.failed_units.len()
            );
        }

        self.output_message(&json!({
            "type": "REPORT",
            "job": config.name,
            "elapsed_ms": start.elapsed().as_millis() as u64,
            "report": report,
        }));
        Ok(())
    }

    /// Print the units a run would harvest
    async fn plan(&self, config: &HarvestConfig) -> Result<()> {
        let (required, in_output) = self.inputs(config)?;
        let checkpoint = CheckpointStore::new(&config.checkpoint).load().await?;
        let completed = planner::completed_units(&in_output, &checkpoint);
        let planned = planner::plan(&required, &completed);

        self.output_message(&json!({
            "type": "PLAN",
            "job": config.name,
            "required": required.len(),
            "completed": required.len() - planned.len(),
            "planned": planned.iter().map(WorkUnit::key).collect::<Vec<_>>(),
        }));
        Ok(())
    }

    /// Print a summary of the checkpoint
    async fn status(&self, config: &HarvestConfig) -> Result<()> {
        let checkpoint = CheckpointStore::new(&config.checkpoint).load().await?;

        self.output_message(&json!({
            "type": "STATUS",
            "job": config.name,
            "checkpoint": config.checkpoint,
            "summary": checkpoint.summary(),
        }));
        Ok(())
    }

    /// Check the job file and its declarations
    fn validate(&self, config: &HarvestConfig) -> Result<()> {
        let declarations = config.declarations()?;
        let units = declarations.required_units();

        self.output_message(&json!({
            "type": "LOG",
            "log": {
                "level": "INFO",
                "message": format!(
                    "Job '{}' is valid with {} sources and {} required units",
                    config.name,
                    declarations.sources.len(),
                    units.len()
                )
            }
        }));
        Ok(())
    }

    fn output_message<T: Serialize>(&self, msg: &T) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}
