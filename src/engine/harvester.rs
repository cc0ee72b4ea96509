//! Job orchestration
//!
//! Loads the checkpoint, plans the remaining units, and drains them one at
//! a time through the paginated source and the checkpoint iterator.

use super::iterator::CheckpointIterator;
use super::transform::RecordTransform;
use super::types::{HarvestOptions, HarvestReport, Interrupt, RunSummary, UnitFailure};
use crate::checkpoint::{Checkpoint, CheckpointStore, UnitStatus};
use crate::error::{Error, Result};
use crate::output::{OutputRecord, RecordSink};
use crate::planner::{self, UnitKey, WorkUnit};
use crate::source::{PageFetcher, PaginatedSource};
use crate::types::{DedupScope, JsonValue};
use std::collections::HashSet;
use tracing::{info, warn};

/// How a unit's processing ended without a fatal error
enum UnitRun {
    Complete,
    Interrupted,
}

/// Runs a whole harvesting job
pub struct Harvester<F> {
    source: PaginatedSource<F>,
    store: CheckpointStore,
    transform: RecordTransform,
    options: HarvestOptions,
    interrupt: Interrupt,
}

impl<F> Harvester<F>
where
    F: PageFetcher<Item = JsonValue>,
{
    /// Create a harvester with default options
    pub fn new(source: PaginatedSource<F>, store: CheckpointStore) -> Self {
        let interrupt = Interrupt::new();
        Self {
            source: source.with_interrupt(interrupt.clone()),
            store,
            transform: RecordTransform::default(),
            options: HarvestOptions::default(),
            interrupt,
        }
    }

    /// Set the record transform
    #[must_use]
    pub fn with_transform(mut self, transform: RecordTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Set the options
    #[must_use]
    pub fn with_options(mut self, options: HarvestOptions) -> Self {
        self.options = options;
        self
    }

    /// Share an interrupt with the caller; the source stops on it too
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.source = self.source.with_interrupt(interrupt.clone());
        self.interrupt = interrupt;
        self
    }

    /// Get the interrupt
    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// Get the paginated source
    pub fn source(&self) -> &PaginatedSource<F> {
        &self.source
    }

    /// Get the checkpoint store
    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Load the checkpoint and compute the remaining units in declared order
    pub async fn plan(
        &self,
        required: &[WorkUnit],
        output_units: &HashSet<UnitKey>,
    ) -> Result<(Checkpoint, Vec<WorkUnit>)> {
        let checkpoint = self.store.load().await?;
        let completed = planner::completed_units(output_units, &checkpoint);
        let planned = planner::plan(required, &completed);
        Ok((checkpoint, planned))
    }

    /// Harvest every required unit not yet completed.
    ///
    /// Unit failures are recorded in the report and the run moves on; only
    /// persistence failures and a corrupt checkpoint abort it.
    pub async fn run<S>(
        &self,
        required: &[WorkUnit],
        output_units: &HashSet<UnitKey>,
        sink: &mut S,
    ) -> Result<HarvestReport>
    where
        S: RecordSink<OutputRecord>,
    {
        let (mut checkpoint, planned) = self.plan(required, output_units).await?;

        let mut report = HarvestReport {
            required: required.len(),
            planned: planned.len(),
            ..HarvestReport::default()
        };

        if planned.is_empty() {
            info!("Nothing to harvest, all {} units are complete", required.len());
            return Ok(report);
        }
        info!(
            "Harvesting {} of {} units",
            planned.len(),
            required.len()
        );

        for (idx, unit) in planned.iter().enumerate() {
            if self.interrupt.is_triggered() {
                report.interrupted = true;
                report.remaining = planned.len() - idx;
                break;
            }

            info!("[{}/{}] Harvesting {unit}", idx + 1, planned.len());

            match self
                .harvest_unit(unit, &mut checkpoint, sink, &mut report.totals)
                .await
            {
                Ok((UnitRun::Complete, _)) => {
                    report.completed_units.push(unit.key());
                }
                Ok((UnitRun::Interrupted, _)) => {
                    report.interrupted = true;
                    report.remaining = planned.len() - idx;
                    break;
                }
                Err((e, _)) if e.is_fatal() => return Err(e),
                Err((e, attempts)) => {
                    warn!("Unit {unit} failed after {attempts} attempt(s): {e}");
                    let rate_limited = matches!(e, Error::RateLimitExceeded { .. });
                    report.failed_units.push(UnitFailure {
                        unit: unit.key(),
                        kind: e.kind().to_string(),
                        error: e.to_string(),
                        attempts,
                    });

                    if rate_limited && self.options.stop_on_rate_limit {
                        report.remaining = planned.len() - idx - 1;
                        warn!(
                            "Stopping on rate limit, {} units left for the next run",
                            report.remaining
                        );
                        break;
                    }
                }
            }
        }

        info!(
            "Harvest finished: {} units complete, {} failed, {} items succeeded, {} failed, {} skipped",
            report.completed_units.len(),
            report.failed_units.len(),
            report.totals.succeeded,
            report.totals.failed,
            report.totals.skipped
        );
        Ok(report)
    }

    /// Drain one unit, retrying it up to `unit_attempts` times
    async fn harvest_unit<S>(
        &self,
        unit: &WorkUnit,
        checkpoint: &mut Checkpoint,
        sink: &mut S,
        totals: &mut RunSummary,
    ) -> std::result::Result<(UnitRun, u32), (Error, u32)>
    where
        S: RecordSink<OutputRecord>,
    {
        let unit_id = unit.id();
        let max_attempts = self.options.unit_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            // Persist the in-progress mark before any row of this unit can be flushed
            checkpoint.mark_unit(&unit_id, UnitStatus::InProgress, None);
            self.save(checkpoint).await.map_err(|e| (e, attempt))?;

            let (summary, result) = self.iterate_unit(unit, checkpoint, sink).await;
            totals.merge(&summary);

            match result {
                Ok(()) if summary.interrupted => return Ok((UnitRun::Interrupted, attempt)),
                Ok(()) => {
                    checkpoint.mark_unit(&unit_id, UnitStatus::Complete, None);
                    self.save(checkpoint).await.map_err(|e| (e, attempt))?;
                    info!(
                        "Unit {unit} complete: {} new, {} skipped, {} failed",
                        summary.succeeded, summary.skipped, summary.failed
                    );
                    return Ok((UnitRun::Complete, attempt));
                }
                Err(e) if e.is_fatal() => return Err((e, attempt)),
                Err(e) if attempt < max_attempts && !self.interrupt.is_triggered() => {
                    let delay = self.source.config().backoff.delay(attempt - 1);
                    warn!(
                        "Unit {unit} attempt {attempt}/{max_attempts} failed: {e}, retrying in {delay:?}"
                    );
                    if !self.interrupt.sleep(delay).await {
                        info!("Interrupt received while waiting to retry {unit}");
                        return Ok((UnitRun::Interrupted, attempt));
                    }
                }
                Err(e) => {
                    checkpoint.mark_unit(&unit_id, UnitStatus::Failed, Some(e.to_string()));
                    self.save(checkpoint).await.map_err(|e| (e, attempt))?;
                    return Err((e, attempt));
                }
            }
        }
    }

    /// One pass over a unit's items; the summary is returned even on error
    async fn iterate_unit<S>(
        &self,
        unit: &WorkUnit,
        checkpoint: &mut Checkpoint,
        sink: &mut S,
    ) -> (RunSummary, Result<()>)
    where
        S: RecordSink<OutputRecord>,
    {
        let transform = &self.transform;

        let mut iterator = CheckpointIterator::new(
            checkpoint,
            &self.store,
            |item: &JsonValue| transform.key(item),
            |item: &JsonValue| Ok(transform.apply(unit, item)),
        )
        .with_sink(sink)
        .with_interrupt(self.interrupt.clone())
        .with_options(self.options.iterator_options());

        if self.options.dedup_scope == DedupScope::PerUnit {
            iterator = iterator.with_scope(unit.id());
        }

        let stream = self.source.fetch(unit, self.options.page_size);
        let result = iterator.run(stream).await.map(|_| ());
        (iterator.summary().clone(), result)
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.store.save(checkpoint).await.map_err(|e| {
            if e.is_fatal() {
                e
            } else {
                Error::persistence(e.to_string())
            }
        })
    }
}

impl<F> std::fmt::Debug for Harvester<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harvester")
            .field("source", &self.source)
            .field("store", &self.store)
            .field("transform", &self.transform)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
