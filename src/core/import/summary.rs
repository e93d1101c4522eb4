//! Import summary and reporting

use super::coordinator::LoadReport;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Summary of an import across all batches
#[derive(Debug, Clone)]
pub struct ImportSummary {
    /// Batches handed to the loader
    pub batches: usize,

    /// Batches whose decision was COMMIT
    pub committed_batches: usize,

    /// Batches whose decision was ABORT
    pub aborted_batches: usize,

    /// Rows made durable
    pub committed_rows: u64,

    /// Rows in aborted batches
    pub aborted_rows: u64,

    /// Partitions that failed to commit after a COMMIT decision
    pub commit_failures: usize,

    /// Reading stopped after an aborted batch
    pub stopped_early: bool,

    /// Reading stopped on a shutdown request
    pub interrupted: bool,

    /// When the import started
    pub started_at: DateTime<Utc>,

    /// Duration of the import
    pub duration: Duration,
}

impl Default for ImportSummary {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportSummary {
    /// Create a new empty import summary
    pub fn new() -> Self {
        Self {
            batches: 0,
            committed_batches: 0,
            aborted_batches: 0,
            committed_rows: 0,
            aborted_rows: 0,
            commit_failures: 0,
            stopped_early: false,
            interrupted: false,
            started_at: Utc::now(),
            duration: Duration::from_secs(0),
        }
    }

    /// Fold one batch report into the totals
    pub fn record(&mut self, report: &LoadReport) {
        self.batches += 1;
        if report.decision.is_commit() {
            self.committed_batches += 1;
        } else {
            self.aborted_batches += 1;
            self.aborted_rows += report.rows() as u64;
        }
        self.committed_rows += report.committed_rows() as u64;
        self.commit_failures += report.commit_failures();
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Whether every batch committed cleanly
    pub fn is_complete(&self) -> bool {
        self.aborted_batches == 0
            && self.commit_failures == 0
            && !self.stopped_early
            && !self.interrupted
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            batches = self.batches,
            committed_batches = self.committed_batches,
            aborted_batches = self.aborted_batches,
            committed_rows = self.committed_rows,
            aborted_rows = self.aborted_rows,
            started_at = %self.started_at.to_rfc3339(),
            duration_ms = self.duration.as_millis() as u64,
            "Import completed"
        );

        if self.interrupted {
            tracing::warn!(batches = self.batches, "Import interrupted");
        }
        if self.stopped_early {
            tracing::warn!("Import stopped after the first aborted batch");
        }
        if self.commit_failures > 0 {
            tracing::error!(
                commit_failures = self.commit_failures,
                "Some partitions failed to commit after a COMMIT decision"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::import::coordinator::{PartitionReport, PartitionResolution};
    use crate::domain::{GlobalDecision, WorkOutcome};

    fn report(decision: GlobalDecision, resolution: PartitionResolution) -> LoadReport {
        LoadReport {
            batch_index: 0,
            decision,
            partitions: vec![
                PartitionReport {
                    partition_id: 0,
                    rows: 3,
                    outcome: WorkOutcome::success(0),
                    resolution: resolution.clone(),
                },
                PartitionReport {
                    partition_id: 1,
                    rows: 4,
                    outcome: WorkOutcome::success(1),
                    resolution,
                },
            ],
            duration: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_record_committed_and_aborted() {
        let mut summary = ImportSummary::new();
        summary.record(&report(
            GlobalDecision::Commit,
            PartitionResolution::Committed,
        ));
        summary.record(&report(
            GlobalDecision::Abort,
            PartitionResolution::RolledBack,
        ));

        assert_eq!(summary.batches, 2);
        assert_eq!(summary.committed_batches, 1);
        assert_eq!(summary.aborted_batches, 1);
        assert_eq!(summary.committed_rows, 7);
        assert_eq!(summary.aborted_rows, 7);
        assert!(!summary.is_complete());
    }

    #[test]
    fn test_commit_failures_counted() {
        let mut summary = ImportSummary::new();
        summary.record(&report(
            GlobalDecision::Commit,
            PartitionResolution::ResolveFailed("connection reset".into()),
        ));

        assert_eq!(summary.commit_failures, 2);
        assert_eq!(summary.committed_rows, 0);
        assert!(!summary.is_complete());
    }
}
