//! Export engine
//!
//! Fans page reads out over a bounded pool of tasks and funnels every page
//! through the [`SerializedSheetWriter`]. The document is finalized only after
//! every dispatched task has been joined; if any task failed, the document is
//! abandoned and the first failure is returned.
//!
//! # Pagination caveat
//!
//! Under [`PaginationPolicy::Offset`] the row count is taken once and pages
//! are read concurrently from a live table. Rows inserted or deleted during
//! the export can shift offsets, so a row may be skipped or repeated. Use
//! [`PaginationPolicy::Keyset`] when the source may change.

use super::sheet_writer::{SerializedSheetWriter, SheetWriterHandle};
use super::summary::ExportSummary;
use crate::adapters::document::SheetWriter;
use crate::config::{ExportConfig, PaginationPolicy};
use crate::core::pager::{KeysetCursor, KeysetPager};
use crate::domain::{Record, Result, SheetPartition, TransferError};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};

/// Export tuning
#[derive(Debug, Clone)]
pub struct ExportSettings {
    /// Rows per page and per sheet
    pub page_size: usize,
    /// Maximum pages in flight
    pub concurrency: usize,
    /// Pagination policy
    pub pagination: PaginationPolicy,
    /// Sheet name prefix
    pub sheet_name_prefix: String,
    /// Sink queue depth
    pub queue_depth: usize,
}

impl From<&ExportConfig> for ExportSettings {
    fn from(config: &ExportConfig) -> Self {
        Self {
            page_size: config.page_size,
            concurrency: config.concurrency,
            pagination: config.pagination,
            sheet_name_prefix: config.sheet_name_prefix.clone(),
            queue_depth: config.queue_depth,
        }
    }
}

/// What one page task contributed
enum PageResult {
    Written(usize),
    Empty,
}

/// Running tally while tasks are joined
#[derive(Default)]
struct Progress {
    pages_written: usize,
    empty_pages: usize,
    rows_written: u64,
    first_error: Option<TransferError>,
}

impl Progress {
    fn record(&mut self, joined: std::result::Result<Result<PageResult>, JoinError>) {
        match joined {
            Ok(Ok(PageResult::Written(rows))) => {
                self.pages_written += 1;
                self.rows_written += rows as u64;
            }
            Ok(Ok(PageResult::Empty)) => self.empty_pages += 1,
            Ok(Err(e)) => self.fail(e),
            Err(e) => self.fail(TransferError::Other(format!("page task failed: {e}"))),
        }
    }

    fn fail(&mut self, error: TransferError) {
        tracing::error!(error = %error, "Page export failed");
        if self.first_error.is_none() {
            self.first_error = Some(error);
        }
    }

    fn failed(&self) -> bool {
        self.first_error.is_some()
    }
}

/// Parallel paged export into a workbook document
pub struct ExportEngine {
    pager: KeysetPager,
    settings: ExportSettings,
}

impl ExportEngine {
    /// Create an engine
    pub fn new(pager: KeysetPager, settings: ExportSettings) -> Self {
        Self { pager, settings }
    }

    /// Count the source, then export it into `writer`
    pub async fn export(&self, writer: Box<dyn SheetWriter>) -> Result<ExportSummary> {
        let total = self.pager.count().await?;
        self.export_rows(total, writer).await
    }

    /// Export into `writer` given an already known row count
    ///
    /// Under the offset policy `total` fixes the number of pages,
    /// `ceil(total / page_size)`. Under the keyset policy paging continues
    /// until an empty or short page, and `total` is only reported.
    ///
    /// # Errors
    ///
    /// Returns the first page failure once every task has been joined, or
    /// the sink's finalize failure. In both cases the document is not
    /// finalized.
    pub async fn export_rows(
        &self,
        total: u64,
        writer: Box<dyn SheetWriter>,
    ) -> Result<ExportSummary> {
        let start = Instant::now();
        let settings = &self.settings;
        if settings.page_size == 0 {
            return Err(TransferError::Configuration(
                "page size must be > 0".to_string(),
            ));
        }

        tracing::info!(
            policy = %settings.pagination,
            expected_rows = total,
            page_size = settings.page_size,
            concurrency = settings.concurrency,
            "Starting export"
        );

        let mut summary = ExportSummary::new(settings.pagination, total);
        let sink = SerializedSheetWriter::open(writer, settings.queue_depth);
        let progress = match settings.pagination {
            PaginationPolicy::Offset => self.run_offset(total, &sink).await,
            PaginationPolicy::Keyset => self.run_keyset(&sink).await,
        };

        if let Some(error) = progress.first_error {
            sink.abandon().await;
            return Err(error);
        }

        let stats = sink.finish().await?;

        summary.pages_written = progress.pages_written;
        summary.empty_pages = progress.empty_pages;
        summary.rows_written = progress.rows_written;
        summary.sheets = stats.sheets;
        let summary = summary.with_duration(start.elapsed());
        summary.log_summary();
        Ok(summary)
    }

    async fn acquire(semaphore: &Arc<Semaphore>) -> Result<OwnedSemaphorePermit> {
        semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TransferError::Other("export worker pool closed".to_string()))
    }

    /// Every page is independent: each task computes its own offset
    async fn run_offset(&self, total: u64, sink: &SerializedSheetWriter) -> Progress {
        let page_size = self.settings.page_size;
        let pages = total.div_ceil(page_size as u64);
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut progress = Progress::default();

        for index in 0..pages as usize {
            while let Some(joined) = tasks.try_join_next() {
                progress.record(joined);
            }
            if progress.failed() {
                tracing::warn!(page_index = index, "Stopping page dispatch after failure");
                break;
            }

            let permit = match Self::acquire(&semaphore).await {
                Ok(permit) => permit,
                Err(e) => {
                    progress.fail(e);
                    break;
                }
            };
            let pager = self.pager.clone();
            let handle = sink.handle();
            let prefix = self.settings.sheet_name_prefix.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let page = pager.page_at(index, page_size).await?;
                write_page(&handle, &prefix, index, page.rows).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            progress.record(joined);
        }
        progress
    }

    /// Pages are read one after another; each write overlaps the next read
    async fn run_keyset(&self, sink: &SerializedSheetWriter) -> Progress {
        let page_size = self.settings.page_size;
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut progress = Progress::default();
        let mut cursor = KeysetCursor::new();
        let mut index = 0;

        while !cursor.is_exhausted() {
            while let Some(joined) = tasks.try_join_next() {
                progress.record(joined);
            }
            if progress.failed() {
                break;
            }

            let page = match self.pager.next_page(cursor.after_key(), page_size).await {
                Ok(page) => page,
                Err(e) => {
                    progress.fail(e);
                    break;
                }
            };
            cursor.advance(&page, page_size);
            if page.is_empty() {
                progress.empty_pages += 1;
                break;
            }

            let permit = match Self::acquire(&semaphore).await {
                Ok(permit) => permit,
                Err(e) => {
                    progress.fail(e);
                    break;
                }
            };
            let handle = sink.handle();
            let prefix = self.settings.sheet_name_prefix.clone();
            let page_index = index;
            tasks.spawn(async move {
                let _permit = permit;
                write_page(&handle, &prefix, page_index, page.rows).await
            });
            index += 1;
        }

        while let Some(joined) = tasks.join_next().await {
            progress.record(joined);
        }
        progress
    }
}

async fn write_page(
    handle: &SheetWriterHandle,
    prefix: &str,
    index: usize,
    rows: Vec<Record>,
) -> Result<PageResult> {
    if rows.is_empty() {
        tracing::debug!(page_index = index, "Empty page; nothing to write");
        return Ok(PageResult::Empty);
    }

    let sheet = SheetPartition::for_page(prefix, index).map_err(TransferError::SinkWrite)?;
    let count = rows.len();
    handle.write_partition(sheet, rows).await?;
    Ok(PageResult::Written(count))
}
