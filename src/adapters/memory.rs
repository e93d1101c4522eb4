//! In-memory table
//!
//! A [`RecordSource`] and [`BulkWriter`] over a `BTreeMap`, used for dry-run
//! imports and for exercising the engines in tests. Transactions stage their
//! rows privately and apply them atomically on commit, so rollback and
//! abandonment leave the table untouched.

use crate::adapters::database::traits::{BulkWriter, RecordSource, Transaction};
use crate::domain::{Record, RecordKey, Result, TransferError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Default)]
struct Inner {
    rows: BTreeMap<RecordKey, Record>,
    failing_keys: HashSet<RecordKey>,
    stalling_keys: HashSet<RecordKey>,
    panicking_keys: HashSet<RecordKey>,
    failing_reads: usize,
}

#[derive(Default)]
struct Counters {
    begun: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
    abandoned: AtomicU64,
}

/// Snapshot of transaction counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionStats {
    /// Transactions opened
    pub begun: u64,
    /// Transactions committed
    pub committed: u64,
    /// Transactions rolled back explicitly
    pub rolled_back: u64,
    /// Transactions dropped without resolution
    pub abandoned: u64,
}

/// Shared in-memory table keyed by [`RecordKey`]
///
/// Cloning shares the underlying table.
#[derive(Clone, Default)]
pub struct MemoryTable {
    inner: Arc<Mutex<Inner>>,
    counters: Arc<Counters>,
}

impl MemoryTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table holding `rows`
    pub fn with_rows(rows: impl IntoIterator<Item = Record>) -> Self {
        let table = Self::new();
        table.append(rows);
        table
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking writer never leaves the map half-updated
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Insert or replace rows outside any transaction
    pub fn append(&self, rows: impl IntoIterator<Item = Record>) {
        let mut inner = self.lock();
        for row in rows {
            inner.rows.insert(row.key, row);
        }
    }

    /// Number of committed rows
    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    /// Whether the table holds no committed rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All committed rows in key order
    pub fn rows(&self) -> Vec<Record> {
        self.lock().rows.values().cloned().collect()
    }

    /// Make any insert containing `key` fail
    pub fn inject_insert_failure(&self, key: RecordKey) {
        self.lock().failing_keys.insert(key);
    }

    /// Make any insert containing `key` hang until cancelled
    pub fn inject_insert_stall(&self, key: RecordKey) {
        self.lock().stalling_keys.insert(key);
    }

    /// Make any insert containing `key` panic
    pub fn inject_insert_panic(&self, key: RecordKey) {
        self.lock().panicking_keys.insert(key);
    }

    /// Make the next `count` page reads fail with a retryable error
    pub fn inject_read_failures(&self, count: usize) {
        self.lock().failing_reads = count;
    }

    /// Transaction counters so far
    pub fn transaction_stats(&self) -> TransactionStats {
        TransactionStats {
            begun: self.counters.begun.load(Ordering::SeqCst),
            committed: self.counters.committed.load(Ordering::SeqCst),
            rolled_back: self.counters.rolled_back.load(Ordering::SeqCst),
            abandoned: self.counters.abandoned.load(Ordering::SeqCst),
        }
    }

    fn take_read_failure(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.failing_reads > 0 {
            inner.failing_reads -= 1;
            return Err(TransferError::SourceRead(
                "injected read failure".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordSource for MemoryTable {
    async fn count(&self) -> Result<u64> {
        self.take_read_failure()?;
        Ok(self.len() as u64)
    }

    async fn fetch_offset(&self, offset: u64, limit: usize) -> Result<Vec<Record>> {
        self.take_read_failure()?;
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        Ok(self
            .lock()
            .rows
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn fetch_after(&self, after: Option<RecordKey>, limit: usize) -> Result<Vec<Record>> {
        self.take_read_failure()?;
        let inner = self.lock();
        let rows = match after {
            Some(key) => inner
                .rows
                .range((std::ops::Bound::Excluded(key), std::ops::Bound::Unbounded))
                .map(|(_, r)| r.clone())
                .take(limit)
                .collect(),
            None => inner.rows.values().take(limit).cloned().collect(),
        };
        Ok(rows)
    }
}

#[async_trait]
impl BulkWriter for MemoryTable {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        self.counters.begun.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryTransaction {
            table: self.clone(),
            staged: Vec::new(),
            resolved: false,
        }))
    }
}

enum Fault {
    None,
    Fail(RecordKey),
    Stall,
    Panic(RecordKey),
}

struct MemoryTransaction {
    table: MemoryTable,
    staged: Vec<Record>,
    resolved: bool,
}

impl MemoryTransaction {
    fn fault_for(&self, rows: &[Record]) -> Fault {
        let inner = self.table.lock();
        for row in rows {
            if inner.panicking_keys.contains(&row.key) {
                return Fault::Panic(row.key);
            }
            if inner.stalling_keys.contains(&row.key) {
                return Fault::Stall;
            }
            if inner.failing_keys.contains(&row.key) {
                return Fault::Fail(row.key);
            }
        }
        Fault::None
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn bulk_insert(&mut self, rows: &[Record]) -> Result<u64> {
        match self.fault_for(rows) {
            Fault::None => {}
            Fault::Fail(key) => {
                return Err(TransferError::Database(format!(
                    "injected insert failure at key {key}"
                )))
            }
            Fault::Stall => loop {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            },
            Fault::Panic(key) => panic!("injected insert panic at key {key}"),
        }

        {
            let inner = self.table.lock();
            if let Some(dup) = rows.iter().find(|r| inner.rows.contains_key(&r.key)) {
                return Err(TransferError::Database(format!(
                    "duplicate key value {} violates unique constraint",
                    dup.key
                )));
            }
        }

        self.staged.extend_from_slice(rows);
        Ok(rows.len() as u64)
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        let staged = std::mem::take(&mut self.staged);
        {
            let mut inner = self.table.lock();
            if let Some(dup) = staged.iter().find(|r| inner.rows.contains_key(&r.key)) {
                return Err(TransferError::Database(format!(
                    "duplicate key value {} violates unique constraint",
                    dup.key
                )));
            }
            for row in staged {
                inner.rows.insert(row.key, row);
            }
        }
        self.resolved = true;
        self.table.counters.committed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        self.staged.clear();
        self.resolved = true;
        self.table.counters.rolled_back.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if !self.resolved {
            self.table.counters.abandoned.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(range: std::ops::Range<i64>) -> Vec<Record> {
        range
            .map(|k| Record::new(k).with_field("n", k * 10))
            .collect()
    }

    #[tokio::test]
    async fn test_offset_and_keyset_reads() {
        let table = MemoryTable::with_rows(rows(1..11));

        assert_eq!(table.count().await.unwrap(), 10);

        let page = table.fetch_offset(8, 5).await.unwrap();
        assert_eq!(page.iter().map(|r| r.key).collect::<Vec<_>>(), vec![9, 10]);

        let page = table.fetch_after(Some(4), 3).await.unwrap();
        assert_eq!(page.iter().map(|r| r.key).collect::<Vec<_>>(), vec![5, 6, 7]);

        let page = table.fetch_after(None, 2).await.unwrap();
        assert_eq!(page.iter().map(|r| r.key).collect::<Vec<_>>(), vec![1, 2]);

        assert!(table.fetch_after(Some(10), 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_applies_staged_rows() {
        let table = MemoryTable::new();
        let mut tx = table.begin().await.unwrap();

        assert_eq!(tx.bulk_insert(&rows(0..3)).await.unwrap(), 3);
        assert!(table.is_empty());

        tx.commit().await.unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.transaction_stats().committed, 1);
    }

    #[tokio::test]
    async fn test_rollback_and_abandon_discard_rows() {
        let table = MemoryTable::new();

        let mut tx = table.begin().await.unwrap();
        tx.bulk_insert(&rows(0..3)).await.unwrap();
        tx.rollback().await.unwrap();

        let mut tx = table.begin().await.unwrap();
        tx.bulk_insert(&rows(3..5)).await.unwrap();
        drop(tx);

        assert!(table.is_empty());
        let stats = table.transaction_stats();
        assert_eq!(stats.begun, 2);
        assert_eq!(stats.rolled_back, 1);
        assert_eq!(stats.abandoned, 1);
    }

    #[tokio::test]
    async fn test_duplicate_key_rejected() {
        let table = MemoryTable::with_rows(rows(0..2));
        let mut tx = table.begin().await.unwrap();

        let err = tx.bulk_insert(&rows(1..3)).await.unwrap_err();
        assert!(matches!(err, TransferError::Database(_)));
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let table = MemoryTable::new();
        table.inject_insert_failure(7);
        table.inject_read_failures(1);

        let mut tx = table.begin().await.unwrap();
        assert!(tx.bulk_insert(&rows(5..9)).await.is_err());
        tx.rollback().await.unwrap();

        let err = table.count().await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(table.count().await.unwrap(), 0);
    }
}
