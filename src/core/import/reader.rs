//! Bulk import reader
//!
//! Streams a record source in bounded batches and hands each batch to a
//! [`BatchLoader`], waiting for the batch to be fully resolved before the next
//! one is read. At most one batch is held in memory at a time.

use super::coordinator::{CommitCoordinator, LoadReport};
use super::summary::ImportSummary;
use crate::config::ImportConfig;
use crate::domain::{Record, Result, TransferError};
use async_trait::async_trait;
use std::time::Instant;
use tokio::sync::watch;

/// Consumer of record batches
#[async_trait]
pub trait BatchLoader: Send {
    /// Load one batch, returning once it has been committed or aborted
    async fn load(&mut self, batch: Vec<Record>) -> Result<LoadReport>;
}

#[async_trait]
impl BatchLoader for CommitCoordinator {
    async fn load(&mut self, batch: Vec<Record>) -> Result<LoadReport> {
        self.load_batch(batch).await
    }
}

/// Reads batches of records and feeds them to a loader one at a time
#[derive(Debug, Clone)]
pub struct BulkImportReader {
    batch_size: usize,
    stop_on_abort: bool,
    shutdown: Option<watch::Receiver<bool>>,
}

impl BulkImportReader {
    /// Create a reader producing batches of at most `batch_size` records
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            stop_on_abort: false,
            shutdown: None,
        }
    }

    /// Stop before the next batch once `shutdown` turns true
    ///
    /// A batch already handed to the loader is always resolved first.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Stop after the first aborted batch
    pub fn with_stop_on_abort(mut self, stop_on_abort: bool) -> Self {
        self.stop_on_abort = stop_on_abort;
        self
    }

    /// Maximum records per batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Read `records` to the end, loading each batch before reading the next
    ///
    /// Records are read on the blocking pool, so a file-backed source never
    /// stalls the runtime.
    ///
    /// Reading is streamed: a truncated or malformed document is only
    /// detected when the reader reaches the damage, typically the missing
    /// end trailer at EOF. Every batch before that point has already been
    /// committed and is not undone.
    ///
    /// # Errors
    ///
    /// - [`TransferError::EmptySource`] if the source holds no records
    /// - the first error yielded by `records`; batches loaded before it stay
    ///   loaded
    /// - any error returned by the loader
    pub async fn read_all<I>(
        &self,
        records: I,
        loader: &mut dyn BatchLoader,
    ) -> Result<ImportSummary>
    where
        I: Iterator<Item = Result<Record>> + Send + 'static,
    {
        let start = Instant::now();
        let mut summary = ImportSummary::new();
        let mut records = records;

        loop {
            if self.shutdown_requested() {
                tracing::info!(
                    batches = summary.batches,
                    "Shutdown requested; stopping before the next batch"
                );
                summary.interrupted = true;
                break;
            }

            let (rest, batch) = next_batch(records, self.batch_size).await?;
            records = rest;
            let batch = batch?;
            if batch.is_empty() {
                break;
            }

            let report = loader.load(batch).await?;
            summary.record(&report);

            if !report.decision.is_commit() && self.stop_on_abort {
                summary.stopped_early = true;
                break;
            }
        }

        if summary.batches == 0 && !summary.interrupted {
            return Err(TransferError::EmptySource(
                "import source contains no records".to_string(),
            ));
        }

        let summary = summary.with_duration(start.elapsed());
        summary.log_summary();
        Ok(summary)
    }
}

impl BulkImportReader {
    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }
}

impl From<&ImportConfig> for BulkImportReader {
    fn from(config: &ImportConfig) -> Self {
        Self::new(config.batch_size).with_stop_on_abort(config.stop_on_abort)
    }
}

/// Pull up to `limit` records on the blocking pool, returning the iterator
/// with the batch so the caller keeps ownership between batches
async fn next_batch<I>(mut records: I, limit: usize) -> Result<(I, Result<Vec<Record>>)>
where
    I: Iterator<Item = Result<Record>> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let batch = records.by_ref().take(limit).collect::<Result<Vec<_>>>();
        (records, batch)
    })
    .await
    .map_err(|e| TransferError::Other(format!("Record reader task failed: {e}")))
}
