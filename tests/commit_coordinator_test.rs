//! Integration tests for the partitioned bulk-load commit coordinator
//!
//! Each scenario runs under both rendezvous strategies; the externally
//! visible contract is the same for both.

use async_trait::async_trait;
use sheetbridge::adapters::database::{BulkWriter, Transaction};
use sheetbridge::adapters::memory::MemoryTable;
use sheetbridge::config::CommitStrategy;
use sheetbridge::core::import::{CommitCoordinator, LoadSettings, PartitionResolution};
use sheetbridge::domain::{GlobalDecision, Record, Result, TransferError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const STRATEGIES: [CommitStrategy; 2] = [CommitStrategy::Barrier, CommitStrategy::Latch];

fn settings(partition_count: usize, strategy: CommitStrategy) -> LoadSettings {
    LoadSettings {
        partition_count,
        strategy,
        attempt_timeout: Duration::from_millis(300),
        rendezvous_timeout: Duration::from_secs(3),
    }
}

fn batch(keys: std::ops::Range<i64>) -> Vec<Record> {
    keys.map(|k| Record::new(k).with_field("sku", format!("item-{k}")))
        .collect()
}

#[tokio::test]
async fn test_23_items_over_20_partitions_all_commit() {
    for strategy in STRATEGIES {
        let table = MemoryTable::new();
        let mut coordinator =
            CommitCoordinator::new(Arc::new(table.clone()), settings(20, strategy));

        let report = coordinator.load_batch(batch(0..23)).await.unwrap();

        assert_eq!(report.decision, GlobalDecision::Commit, "{strategy}");
        assert_eq!(report.partitions.len(), 20, "{strategy}");
        let sizes: Vec<_> = report.partitions.iter().map(|p| p.rows).collect();
        assert_eq!(&sizes[..19], &[1; 19], "{strategy}");
        assert_eq!(sizes[19], 4, "{strategy}");

        assert!(report
            .partitions
            .iter()
            .all(|p| p.resolution == PartitionResolution::Committed));
        assert_eq!(table.rows(), batch(0..23), "{strategy}");

        let stats = table.transaction_stats();
        assert_eq!(stats.begun, 20, "{strategy}");
        assert_eq!(stats.committed, 20, "{strategy}");
        assert_eq!(stats.rolled_back, 0, "{strategy}");
    }
}

#[tokio::test]
async fn test_single_failure_rolls_back_every_partition() {
    for strategy in STRATEGIES {
        let table = MemoryTable::new();
        table.inject_insert_failure(11);
        let mut coordinator =
            CommitCoordinator::new(Arc::new(table.clone()), settings(8, strategy));

        let report = coordinator.load_batch(batch(0..40)).await.unwrap();

        assert_eq!(report.decision, GlobalDecision::Abort, "{strategy}");
        assert_eq!(report.failed_partitions(), 1, "{strategy}");
        assert_eq!(report.committed_rows(), 0, "{strategy}");
        assert!(report
            .partitions
            .iter()
            .all(|p| p.resolution == PartitionResolution::RolledBack));

        assert!(table.is_empty(), "{strategy}");
        let stats = table.transaction_stats();
        assert_eq!(stats.rolled_back, 8, "{strategy}");
        assert_eq!(stats.committed, 0, "{strategy}");
    }
}

#[tokio::test]
async fn test_stalled_partition_times_out_and_aborts() {
    for strategy in STRATEGIES {
        let table = MemoryTable::new();
        table.inject_insert_stall(3);
        let mut coordinator =
            CommitCoordinator::new(Arc::new(table.clone()), settings(4, strategy));

        let started = Instant::now();
        let report = coordinator.load_batch(batch(0..16)).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(3), "{strategy}");
        assert_eq!(report.decision, GlobalDecision::Abort, "{strategy}");

        let stalled = &report.partitions[0];
        assert!(!stalled.outcome.succeeded);
        assert!(stalled.outcome.error.as_deref().unwrap().contains("timed out"));
        assert_eq!(stalled.resolution, PartitionResolution::NoTransaction);
        assert!(table.is_empty(), "{strategy}");
    }
}

#[tokio::test]
async fn test_rendezvous_timeout_aborts_waiting_peers() {
    for strategy in STRATEGIES {
        let table = MemoryTable::new();
        table.inject_insert_stall(0);
        let settings = LoadSettings {
            partition_count: 3,
            strategy,
            attempt_timeout: Duration::from_secs(2),
            rendezvous_timeout: Duration::from_millis(100),
        };
        let mut coordinator = CommitCoordinator::new(Arc::new(table.clone()), settings);

        let report = coordinator.load_batch(batch(0..9)).await.unwrap();

        assert_eq!(report.decision, GlobalDecision::Abort, "{strategy}");
        // The peers gave up waiting and rolled back their own work
        assert_eq!(report.partitions[1].resolution, PartitionResolution::RolledBack);
        assert_eq!(report.partitions[2].resolution, PartitionResolution::RolledBack);
        assert!(table.is_empty(), "{strategy}");
    }
}

#[tokio::test]
async fn test_panicking_partition_does_not_strand_peers() {
    for strategy in STRATEGIES {
        let table = MemoryTable::new();
        table.inject_insert_panic(9);
        let mut coordinator =
            CommitCoordinator::new(Arc::new(table.clone()), settings(5, strategy));

        let report = coordinator.load_batch(batch(0..10)).await.unwrap();

        assert_eq!(report.decision, GlobalDecision::Abort, "{strategy}");
        assert_eq!(report.partitions.len(), 5, "{strategy}");
        assert!(table.is_empty(), "{strategy}");
    }
}

#[tokio::test]
async fn test_empty_batch_is_an_error() {
    let mut coordinator = CommitCoordinator::new(
        Arc::new(MemoryTable::new()),
        settings(4, CommitStrategy::Barrier),
    );
    let result = coordinator.load_batch(Vec::new()).await;
    assert!(matches!(result, Err(TransferError::EmptySource(_))));
}

/// Writer whose transactions fail to commit on one chosen partition
///
/// Models a connection lost between the decision and `COMMIT`.
struct FlakyCommitWriter {
    table: MemoryTable,
    begun: AtomicUsize,
    failing: usize,
}

struct FlakyTransaction {
    inner: Box<dyn Transaction>,
    fail_commit: bool,
}

#[async_trait]
impl BulkWriter for FlakyCommitWriter {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let index = self.begun.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FlakyTransaction {
            inner: self.table.begin().await?,
            fail_commit: index == self.failing,
        }))
    }
}

#[async_trait]
impl Transaction for FlakyTransaction {
    async fn bulk_insert(&mut self, rows: &[Record]) -> Result<u64> {
        self.inner.bulk_insert(rows).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        if self.fail_commit {
            self.inner.rollback().await?;
            return Err(TransferError::Database("connection reset during COMMIT".into()));
        }
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.inner.rollback().await
    }
}

#[tokio::test]
async fn test_commit_failure_after_decision_is_reported() {
    let table = MemoryTable::new();
    let writer = FlakyCommitWriter {
        table: table.clone(),
        begun: AtomicUsize::new(0),
        failing: 0,
    };
    let mut coordinator =
        CommitCoordinator::new(Arc::new(writer), settings(4, CommitStrategy::Latch));

    let report = coordinator.load_batch(batch(0..8)).await.unwrap();

    assert_eq!(report.decision, GlobalDecision::Commit);
    assert_eq!(report.commit_failures(), 1);
    assert!(!report.is_committed());
    assert_eq!(report.committed_rows(), 6);
    assert_eq!(table.len(), 6);
}

/// Delays each partition's insert by a per-round amount derived from its
/// first key, so arrivals spread across the rendezvous deadline.
struct StaggeredWriter {
    table: MemoryTable,
    round: i64,
}

struct StaggeredTransaction {
    inner: Box<dyn Transaction>,
    round: i64,
}

#[async_trait]
impl BulkWriter for StaggeredWriter {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        Ok(Box::new(StaggeredTransaction {
            inner: self.table.begin().await?,
            round: self.round,
        }))
    }
}

#[async_trait]
impl Transaction for StaggeredTransaction {
    async fn bulk_insert(&mut self, rows: &[Record]) -> Result<u64> {
        let first = rows.first().map_or(0, |r| r.key);
        let delay_ms = (first * 7 + self.round * 3).rem_euclid(19) as u64;
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        self.inner.bulk_insert(rows).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.inner.rollback().await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_parallel_rounds_reach_one_consistent_decision() {
    const ROUNDS: i64 = 150;
    const ROWS: usize = 40;

    for strategy in STRATEGIES {
        let (mut commits, mut aborts) = (0, 0);

        for round in 0..ROUNDS {
            let table = MemoryTable::new();
            let writer = StaggeredWriter {
                table: table.clone(),
                round,
            };
            let settings = LoadSettings {
                partition_count: 20,
                strategy,
                attempt_timeout: Duration::from_secs(1),
                rendezvous_timeout: Duration::from_millis(10 + (round % 15) as u64),
            };
            let mut coordinator = CommitCoordinator::new(Arc::new(writer), settings);

            let report = coordinator.load_batch(batch(0..ROWS as i64)).await.unwrap();

            let expected = match report.decision {
                GlobalDecision::Commit => {
                    commits += 1;
                    PartitionResolution::Committed
                }
                GlobalDecision::Abort => {
                    aborts += 1;
                    PartitionResolution::RolledBack
                }
            };
            for partition in &report.partitions {
                assert_eq!(
                    partition.resolution, expected,
                    "{strategy} round {round} partition {}",
                    partition.partition_id
                );
            }

            let stored = table.len();
            assert!(
                stored == 0 || stored == ROWS,
                "{strategy} round {round}: {stored} rows stored"
            );
            assert_eq!(stored == ROWS, report.decision == GlobalDecision::Commit);

            let stats = table.transaction_stats();
            assert_eq!(stats.begun, 20, "{strategy} round {round}");
            assert_eq!(stats.committed + stats.rolled_back, 20, "{strategy} round {round}");
        }

        assert_eq!(commits + aborts, ROUNDS, "{strategy}");
    }
}
