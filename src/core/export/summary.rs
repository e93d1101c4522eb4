//! Export summary and reporting

use crate::config::PaginationPolicy;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Summary of an export operation
#[derive(Debug, Clone)]
pub struct ExportSummary {
    /// Pagination policy used
    pub policy: PaginationPolicy,

    /// Row count reported by the source before paging began
    pub expected_rows: u64,

    /// Pages handed to the document writer
    pub pages_written: usize,

    /// Pages that came back empty and contributed nothing
    pub empty_pages: usize,

    /// Rows written across all sheets
    pub rows_written: u64,

    /// Sheets in the finalized document
    pub sheets: usize,

    /// When the export started
    pub started_at: DateTime<Utc>,

    /// Duration of the export
    pub duration: Duration,
}

impl ExportSummary {
    /// Create a new empty export summary
    pub fn new(policy: PaginationPolicy, expected_rows: u64) -> Self {
        Self {
            policy,
            expected_rows,
            pages_written: 0,
            empty_pages: 0,
            rows_written: 0,
            sheets: 0,
            started_at: Utc::now(),
            duration: Duration::from_secs(0),
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Whether the rows written differ from the count taken up front
    ///
    /// Expected when the table changed during the export.
    pub fn count_drifted(&self) -> bool {
        self.rows_written != self.expected_rows
    }

    /// Rows written per second
    pub fn rows_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            return self.rows_written as f64;
        }
        self.rows_written as f64 / secs
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            policy = %self.policy,
            expected_rows = self.expected_rows,
            rows_written = self.rows_written,
            pages_written = self.pages_written,
            empty_pages = self.empty_pages,
            sheets = self.sheets,
            started_at = %self.started_at.to_rfc3339(),
            duration_ms = self.duration.as_millis() as u64,
            rows_per_second = format!("{:.0}", self.rows_per_second()),
            "Export completed"
        );

        if self.count_drifted() {
            tracing::warn!(
                expected_rows = self.expected_rows,
                rows_written = self.rows_written,
                "Row count changed while exporting"
            );
        }
    }
}
