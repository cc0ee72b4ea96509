//! Checkpointed iteration
//!
//! Wraps a sequence of raw items with dedup against the checkpoint, failure
//! isolation for the processing function, and flushes of the sink and the
//! checkpoint every `flush_interval` items.

use super::types::{FailedItem, Interrupt, ItemOutcome, IteratorOptions, RunSummary};
use crate::checkpoint::{Checkpoint, CheckpointStore, ItemKey};
use crate::error::{Error, Result};
use crate::output::RecordSink;
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

type KeyFn<'a, P, K> = Box<dyn Fn(&P) -> K + 'a>;
type ProcessFn<'a, P, R> = Box<dyn FnMut(&P) -> anyhow::Result<Option<R>> + 'a>;

/// Consumes items once each, recording every outcome in the checkpoint
pub struct CheckpointIterator<'a, P, K, R> {
    checkpoint: &'a mut Checkpoint,
    store: &'a CheckpointStore,
    key_fn: KeyFn<'a, P, K>,
    process: ProcessFn<'a, P, R>,
    sink: Option<&'a mut dyn RecordSink<R>>,
    scope: Option<String>,
    interrupt: Option<Interrupt>,
    options: IteratorOptions,
    seen: HashSet<String>,
    since_flush: usize,
    summary: RunSummary,
}

impl<'a, P, K, R> CheckpointIterator<'a, P, K, R>
where
    K: ItemKey,
    R: Serialize,
{
    /// Create an iterator over `checkpoint`, persisted through `store`
    pub fn new(
        checkpoint: &'a mut Checkpoint,
        store: &'a CheckpointStore,
        key_fn: impl Fn(&P) -> K + 'a,
        process: impl FnMut(&P) -> anyhow::Result<Option<R>> + 'a,
    ) -> Self {
        Self {
            checkpoint,
            store,
            key_fn: Box::new(key_fn),
            process: Box::new(process),
            sink: None,
            scope: None,
            interrupt: None,
            options: IteratorOptions::default(),
            seen: HashSet::new(),
            since_flush: 0,
            summary: RunSummary::default(),
        }
    }

    /// Send accepted results to `sink`
    #[must_use]
    pub fn with_sink(mut self, sink: &'a mut dyn RecordSink<R>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Prefix every key with `scope`
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Stop between items once `interrupt` is triggered
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    /// Set all options
    #[must_use]
    pub fn with_options(mut self, options: IteratorOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the flush interval (values below 1 are treated as 1)
    #[must_use]
    pub fn with_flush_interval(mut self, interval: usize) -> Self {
        self.options.flush_interval = interval;
        self
    }

    /// Counts so far
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    fn flush_interval(&self) -> usize {
        self.options.flush_interval.max(1)
    }

    fn interrupted(&self) -> bool {
        self.interrupt.as_ref().is_some_and(Interrupt::is_triggered)
    }

    fn key_for(&self, item: &P) -> String {
        let key = (self.key_fn)(item).encode();
        match &self.scope {
            Some(scope) => format!("{scope}|{key}"),
            None => key,
        }
    }

    /// Handle one item, flushing when the interval is reached
    pub async fn step(&mut self, item: &P) -> Result<ItemOutcome> {
        let key = self.key_for(item);
        let outcome = self.process_item(key, item)?;

        self.since_flush += 1;
        if self.since_flush >= self.flush_interval() {
            self.flush().await?;
        }

        Ok(outcome)
    }

    fn process_item(&mut self, key: String, item: &P) -> Result<ItemOutcome> {
        if self.checkpoint.is_done(&key, self.options.retry_failed) || !self.seen.insert(key.clone())
        {
            self.summary.skipped += 1;
            return Ok(ItemOutcome::Skipped);
        }

        match (self.process)(item) {
            Ok(Some(result)) => {
                if let Some(sink) = self.sink.as_deref_mut() {
                    sink.append(&result).map_err(|e| {
                        Error::persistence(format!("Failed to append result for '{key}': {e}"))
                    })?;
                }
                let detail = if self.options.record_details {
                    serde_json::to_value(&result).ok()
                } else {
                    None
                };
                self.checkpoint.record_success(key, detail);
                self.summary.succeeded += 1;
                self.summary.emitted += 1;
                Ok(ItemOutcome::Emitted)
            }
            Ok(None) => {
                self.checkpoint.record_success(key, None);
                self.summary.succeeded += 1;
                Ok(ItemOutcome::Empty)
            }
            Err(e) => {
                let message = format!("{e:#}");
                warn!("{}", Error::processing(&key, &message));
                self.checkpoint.record_failure(key.clone(), message.clone());
                self.summary.failed += 1;
                self.summary.failures.push(FailedItem {
                    key,
                    error: message.clone(),
                });
                Ok(ItemOutcome::Failed(message))
            }
        }
    }

    /// Flush the sink, then save the checkpoint
    pub async fn flush(&mut self) -> Result<()> {
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.flush()
                .map_err(|e| Error::persistence(format!("Failed to flush sink: {e}")))?;
        }

        self.store.save(&*self.checkpoint).await.map_err(|e| {
            if e.is_fatal() {
                e
            } else {
                Error::persistence(e.to_string())
            }
        })?;

        self.since_flush = 0;
        self.summary.flushes += 1;
        debug!(
            "Flushed checkpoint ({} entries, {} processed this run)",
            self.checkpoint.len(),
            self.summary.seen()
        );
        Ok(())
    }

    /// Consume `stream` to its end, an interrupt, or an upstream error.
    ///
    /// A final flush happens in every case. An upstream error is returned
    /// after that flush; the counts remain available through `summary`.
    pub async fn run<S>(&mut self, stream: S) -> Result<RunSummary>
    where
        S: Stream<Item = Result<P>>,
    {
        let mut stream = std::pin::pin!(stream);

        loop {
            if self.interrupted() {
                info!("Interrupt received, stopping after {} items", self.summary.seen());
                self.summary.interrupted = true;
                break;
            }

            match stream.next().await {
                Some(Ok(item)) => {
                    self.step(&item).await?;
                }
                Some(Err(e)) => {
                    self.flush().await?;
                    return Err(e);
                }
                None => {
                    // A source stopped by the interrupt ends its stream early
                    if self.interrupted() {
                        self.summary.interrupted = true;
                    }
                    break;
                }
            }
        }

        self.flush().await?;
        Ok(self.summary.clone())
    }

    /// Consume an in-memory sequence of items
    pub async fn run_iter<I>(&mut self, items: I) -> Result<RunSummary>
    where
        I: IntoIterator<Item = P>,
    {
        self.run(futures::stream::iter(items.into_iter().map(Ok)))
            .await
    }

    /// Final flush; returns the counts
    pub async fn close(mut self) -> Result<RunSummary> {
        self.flush().await?;
        Ok(self.summary)
    }
}
