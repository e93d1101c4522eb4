//! Partitioned bulk-load commit coordinator
//!
//! A batch is split into disjoint partitions, and each partition is inserted
//! by its own worker inside its own transaction. The run has two phases:
//!
//! 1. **Attempt** - every worker begins a transaction, inserts its rows and
//!    records a [`WorkOutcome`]. Errors, panics and timeouts become failed
//!    outcomes; the worker always goes on to the rendezvous.
//! 2. **Resolve** - once the [`GlobalDecision`] is published, every worker
//!    commits or rolls back its own transaction accordingly.
//!
//! # Caveat
//!
//! Workers agree on one decision, but the partitions are still independent
//! transactions. If the decision is COMMIT and a later `COMMIT` statement
//! fails on one connection, the other partitions stay committed. Such
//! partitions are reported as [`LoadReport::commit_failures`].

use super::partition::split_batch;
use super::rendezvous::{self, Rendezvous};
use crate::adapters::database::{BulkWriter, Transaction};
use crate::config::{CommitStrategy, ImportConfig};
use crate::domain::{GlobalDecision, Partition, Record, Result, TransferError, WorkOutcome};
use crate::{log_global_decision, log_partition_outcome};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Tunables of one coordinator
#[derive(Debug, Clone)]
pub struct LoadSettings {
    /// Requested partitions per batch, clamped to the batch length
    pub partition_count: usize,

    /// Rendezvous primitive
    pub strategy: CommitStrategy,

    /// Upper bound on a partition's begin + insert, and on its commit/rollback
    pub attempt_timeout: Duration,

    /// Upper bound on waiting for the global decision
    pub rendezvous_timeout: Duration,
}

impl From<&ImportConfig> for LoadSettings {
    fn from(config: &ImportConfig) -> Self {
        Self {
            partition_count: config.partition_count,
            strategy: config.commit_strategy,
            attempt_timeout: Duration::from_secs(config.attempt_timeout_seconds),
            rendezvous_timeout: Duration::from_secs(config.rendezvous_timeout_seconds),
        }
    }
}

/// How a partition's transaction ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionResolution {
    /// Rows are durable
    Committed,
    /// Rows were discarded
    RolledBack,
    /// The commit or rollback statement failed or timed out
    ResolveFailed(String),
    /// No transaction was open at decision time
    ///
    /// Either `BEGIN` failed, or the attempt panicked or timed out and its
    /// connection was discarded.
    NoTransaction,
}

/// One partition's part in a batch
#[derive(Debug, Clone)]
pub struct PartitionReport {
    /// Partition index
    pub partition_id: usize,

    /// Rows assigned to the partition
    pub rows: usize,

    /// Result of the insert attempt
    pub outcome: WorkOutcome,

    /// How the transaction ended
    pub resolution: PartitionResolution,
}

/// Result of loading one batch
#[derive(Debug, Clone)]
pub struct LoadReport {
    /// Zero-based index of the batch within this coordinator's lifetime
    pub batch_index: usize,

    /// The decision every partition acted on
    pub decision: GlobalDecision,

    /// Per-partition detail, ordered by partition id
    pub partitions: Vec<PartitionReport>,

    /// Wall time of the whole batch
    pub duration: Duration,
}

impl LoadReport {
    /// Rows in the batch
    pub fn rows(&self) -> usize {
        self.partitions.iter().map(|p| p.rows).sum()
    }

    /// Rows made durable
    pub fn committed_rows(&self) -> usize {
        self.partitions
            .iter()
            .filter(|p| p.resolution == PartitionResolution::Committed)
            .map(|p| p.rows)
            .sum()
    }

    /// Partitions whose insert attempt failed
    pub fn failed_partitions(&self) -> usize {
        self.partitions
            .iter()
            .filter(|p| !p.outcome.succeeded)
            .count()
    }

    /// Partitions that were told to commit but could not
    pub fn commit_failures(&self) -> usize {
        if self.decision != GlobalDecision::Commit {
            return 0;
        }
        self.partitions
            .iter()
            .filter(|p| matches!(p.resolution, PartitionResolution::ResolveFailed(_)))
            .count()
    }

    /// Whether every partition committed
    pub fn is_committed(&self) -> bool {
        self.decision == GlobalDecision::Commit && self.commit_failures() == 0
    }
}

/// Runs batches through the two-phase partitioned load
pub struct CommitCoordinator {
    writer: Arc<dyn BulkWriter>,
    settings: LoadSettings,
    batches: usize,
}

impl CommitCoordinator {
    /// Create a coordinator writing through `writer`
    pub fn new(writer: Arc<dyn BulkWriter>, settings: LoadSettings) -> Self {
        Self {
            writer,
            settings,
            batches: 0,
        }
    }

    /// Settings in use
    pub fn settings(&self) -> &LoadSettings {
        &self.settings
    }

    /// Load one batch; every partition commits or every partition rolls back
    ///
    /// Returns once every worker has resolved its transaction. An aborted
    /// batch is a normal result, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::EmptySource`] for an empty batch.
    pub async fn load_batch(&mut self, batch: Vec<Record>) -> Result<LoadReport> {
        if batch.is_empty() {
            return Err(TransferError::EmptySource(
                "batch contains no records".to_string(),
            ));
        }

        let start = Instant::now();
        let batch_index = self.batches;
        self.batches += 1;

        let partitions = split_batch(batch, self.settings.partition_count);
        let parties = partitions.len();
        let sizes: Vec<usize> = partitions.iter().map(Partition::len).collect();

        tracing::debug!(
            batch = batch_index,
            rows = sizes.iter().sum::<usize>(),
            partitions = parties,
            strategy = %self.settings.strategy,
            "Loading batch"
        );

        let rendezvous = rendezvous::for_strategy(
            self.settings.strategy,
            parties,
            self.settings.rendezvous_timeout,
        );

        let mut workers = JoinSet::new();
        for partition in partitions {
            workers.spawn(run_partition(
                self.writer.clone(),
                partition,
                rendezvous.clone(),
                self.settings.attempt_timeout,
            ));
        }

        let mut reports = Vec::with_capacity(parties);
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => tracing::error!(
                    batch = batch_index,
                    error = %e,
                    "Partition worker ended abnormally"
                ),
            }
        }

        // A worker can only be lost after it has arrived, while resolving.
        // Its connection was dropped unresolved.
        for (id, &rows) in sizes.iter().enumerate() {
            if !reports.iter().any(|r| r.partition_id == id) {
                reports.push(PartitionReport {
                    partition_id: id,
                    rows,
                    outcome: WorkOutcome::failure(id, "worker ended abnormally"),
                    resolution: PartitionResolution::ResolveFailed(
                        "worker ended before resolving".to_string(),
                    ),
                });
            }
        }
        reports.sort_by_key(|r| r.partition_id);

        let report = LoadReport {
            batch_index,
            decision: rendezvous.decision().unwrap_or(GlobalDecision::Abort),
            partitions: reports,
            duration: start.elapsed(),
        };

        log_global_decision!(
            batch_index,
            report.decision,
            parties,
            report.failed_partitions()
        );
        if report.commit_failures() > 0 {
            tracing::error!(
                batch = batch_index,
                commit_failures = report.commit_failures(),
                committed_rows = report.committed_rows(),
                "Batch partially committed"
            );
        }

        Ok(report)
    }
}

async fn run_partition(
    writer: Arc<dyn BulkWriter>,
    partition: Partition,
    rendezvous: Arc<dyn Rendezvous>,
    attempt_timeout: Duration,
) -> PartitionReport {
    let Partition { id, rows } = partition;

    let attempt = AssertUnwindSafe(tokio::time::timeout(
        attempt_timeout,
        attempt_insert(writer.as_ref(), &rows),
    ))
    .catch_unwind()
    .await;

    let (transaction, failure) = match attempt {
        Ok(Ok((transaction, Ok(affected)))) if affected >= 1 => (transaction, None),
        Ok(Ok((transaction, Ok(_)))) => (transaction, Some("insert affected no rows".to_string())),
        Ok(Ok((transaction, Err(e)))) => (transaction, Some(e.to_string())),
        Ok(Err(_)) => (
            None,
            Some(format!(
                "insert timed out after {}s",
                attempt_timeout.as_secs_f64()
            )),
        ),
        Err(panic) => (
            None,
            Some(format!("insert panicked: {}", panic_message(panic.as_ref()))),
        ),
    };

    let outcome = match failure {
        None => WorkOutcome::success(id),
        Some(message) => {
            let error = TransferError::PartitionLoad {
                partition_id: id,
                message,
            };
            WorkOutcome::failure(id, error.to_string())
        }
    };

    log_partition_outcome!(&outcome, rows.len());

    let decision = rendezvous.arrive(outcome.clone()).await;

    let resolution = match transaction {
        Some(transaction) => resolve(id, transaction, decision, attempt_timeout).await,
        None => PartitionResolution::NoTransaction,
    };

    PartitionReport {
        partition_id: id,
        rows: rows.len(),
        outcome,
        resolution,
    }
}

/// Begin and insert; the transaction is handed back even if the insert failed
async fn attempt_insert(
    writer: &dyn BulkWriter,
    rows: &[Record],
) -> (Option<Box<dyn Transaction>>, Result<u64>) {
    let mut transaction = match writer.begin().await {
        Ok(transaction) => transaction,
        Err(e) => return (None, Err(e)),
    };
    let inserted = transaction.bulk_insert(rows).await;
    (Some(transaction), inserted)
}

async fn resolve(
    partition_id: usize,
    transaction: Box<dyn Transaction>,
    decision: GlobalDecision,
    limit: Duration,
) -> PartitionResolution {
    let resolved = match decision {
        GlobalDecision::Commit => tokio::time::timeout(limit, transaction.commit()).await,
        GlobalDecision::Abort => tokio::time::timeout(limit, transaction.rollback()).await,
    };

    match (resolved, decision) {
        (Ok(Ok(())), GlobalDecision::Commit) => PartitionResolution::Committed,
        (Ok(Ok(())), GlobalDecision::Abort) => PartitionResolution::RolledBack,
        (Ok(Err(e)), _) => {
            tracing::error!(
                partition_id,
                decision = %decision,
                error = %e,
                "Failed to resolve partition transaction"
            );
            PartitionResolution::ResolveFailed(e.to_string())
        }
        (Err(_), _) => {
            tracing::error!(
                partition_id,
                decision = %decision,
                timeout_ms = limit.as_millis() as u64,
                "Timed out resolving partition transaction"
            );
            PartitionResolution::ResolveFailed(format!("{decision} timed out"))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryTable;

    fn settings(partition_count: usize, strategy: CommitStrategy) -> LoadSettings {
        LoadSettings {
            partition_count,
            strategy,
            attempt_timeout: Duration::from_millis(200),
            rendezvous_timeout: Duration::from_secs(2),
        }
    }

    fn batch(keys: std::ops::Range<i64>) -> Vec<Record> {
        keys.map(|k| Record::new(k).with_field("name", format!("user{k}")))
            .collect()
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected() {
        let table = MemoryTable::new();
        let mut coordinator =
            CommitCoordinator::new(Arc::new(table), settings(4, CommitStrategy::Barrier));

        let result = coordinator.load_batch(Vec::new()).await;
        assert!(matches!(result, Err(TransferError::EmptySource(_))));
    }

    #[tokio::test]
    async fn test_successful_batch_commits_every_partition() {
        let table = MemoryTable::new();
        let mut coordinator = CommitCoordinator::new(
            Arc::new(table.clone()),
            settings(4, CommitStrategy::Barrier),
        );

        let report = coordinator.load_batch(batch(0..10)).await.unwrap();

        assert_eq!(report.decision, GlobalDecision::Commit);
        assert!(report.is_committed());
        assert_eq!(report.committed_rows(), 10);
        assert_eq!(table.len(), 10);
        assert_eq!(table.transaction_stats().committed, 4);
        assert_eq!(table.transaction_stats().rolled_back, 0);
    }

    #[tokio::test]
    async fn test_failure_rolls_back_every_partition() {
        let table = MemoryTable::new();
        table.inject_insert_failure(7);
        let mut coordinator = CommitCoordinator::new(
            Arc::new(table.clone()),
            settings(5, CommitStrategy::Latch),
        );

        let report = coordinator.load_batch(batch(0..10)).await.unwrap();

        assert_eq!(report.decision, GlobalDecision::Abort);
        assert_eq!(report.failed_partitions(), 1);
        assert_eq!(report.committed_rows(), 0);
        assert!(table.is_empty());
        assert_eq!(table.transaction_stats().rolled_back, 5);
        assert_eq!(table.transaction_stats().committed, 0);
    }

    #[tokio::test]
    async fn test_panicking_insert_still_reaches_rendezvous() {
        let table = MemoryTable::new();
        table.inject_insert_panic(2);
        let mut coordinator = CommitCoordinator::new(
            Arc::new(table.clone()),
            settings(3, CommitStrategy::Barrier),
        );

        let report = coordinator.load_batch(batch(0..6)).await.unwrap();

        assert_eq!(report.decision, GlobalDecision::Abort);
        let panicked = &report.partitions[1];
        assert_eq!(panicked.resolution, PartitionResolution::NoTransaction);
        assert!(panicked
            .outcome
            .error
            .as_deref()
            .unwrap()
            .contains("panicked"));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_batch_index_advances() {
        let table = MemoryTable::new();
        let mut coordinator =
            CommitCoordinator::new(Arc::new(table), settings(2, CommitStrategy::Latch));

        let first = coordinator.load_batch(batch(0..4)).await.unwrap();
        let second = coordinator.load_batch(batch(4..8)).await.unwrap();

        assert_eq!(first.batch_index, 0);
        assert_eq!(second.batch_index, 1);
    }

    #[test]
    fn test_settings_from_config() {
        let config = ImportConfig {
            partition_count: 12,
            commit_strategy: CommitStrategy::Latch,
            attempt_timeout_seconds: 30,
            ..Default::default()
        };
        let settings = LoadSettings::from(&config);

        assert_eq!(settings.partition_count, 12);
        assert_eq!(settings.strategy, CommitStrategy::Latch);
        assert_eq!(settings.attempt_timeout, Duration::from_secs(30));
    }
}
