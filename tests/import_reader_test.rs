//! Integration tests for the bulk import path
//!
//! Documents are produced by the export engine, read back through the
//! JSON-lines reader and loaded by the commit coordinator.

use sheetbridge::adapters::document::{JsonlWorkbookReader, JsonlWorkbookWriter, SheetWriter};
use sheetbridge::adapters::memory::MemoryTable;
use sheetbridge::config::{CommitStrategy, PaginationPolicy, RetryConfig};
use sheetbridge::core::export::{ExportEngine, ExportSettings};
use sheetbridge::core::import::{BulkImportReader, CommitCoordinator, LoadSettings};
use sheetbridge::core::pager::KeysetPager;
use sheetbridge::domain::{Record, SheetPartition, TransferError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use test_case::test_case;
use tokio::sync::watch;

fn orders(keys: std::ops::RangeInclusive<i64>) -> Vec<Record> {
    keys.map(|k| {
        Record::new(k)
            .with_field("customer", format!("c-{}", k % 7))
            .with_field("total", k as f64 * 1.5)
    })
    .collect()
}

fn load_settings(strategy: CommitStrategy) -> LoadSettings {
    LoadSettings {
        partition_count: 6,
        strategy,
        attempt_timeout: Duration::from_secs(5),
        rendezvous_timeout: Duration::from_secs(5),
    }
}

async fn export_document(rows: Vec<Record>, dir: &TempDir) -> PathBuf {
    let path = dir.path().join("orders.jsonl");
    let engine = ExportEngine::new(
        KeysetPager::new(Arc::new(MemoryTable::with_rows(rows)), RetryConfig::default()),
        ExportSettings {
            page_size: 40,
            concurrency: 3,
            pagination: PaginationPolicy::Offset,
            sheet_name_prefix: "orders".to_string(),
            queue_depth: 4,
        },
    );
    engine
        .export(Box::new(JsonlWorkbookWriter::create(&path).unwrap()))
        .await
        .unwrap();
    path
}

fn reader(path: &Path) -> JsonlWorkbookReader<std::io::BufReader<std::fs::File>> {
    JsonlWorkbookReader::open(path).unwrap()
}

#[test_case(CommitStrategy::Barrier ; "barrier")]
#[test_case(CommitStrategy::Latch ; "latch")]
#[tokio::test]
async fn test_export_then_import_round_trip(strategy: CommitStrategy) {
    let dir = TempDir::new().unwrap();
    let path = export_document(orders(1..=250), &dir).await;

    let target = MemoryTable::new();
    let mut coordinator = CommitCoordinator::new(Arc::new(target.clone()), load_settings(strategy));

    let summary = BulkImportReader::new(100)
        .read_all(reader(&path), &mut coordinator)
        .await
        .unwrap();

    assert!(summary.is_complete());
    assert_eq!(summary.batches, 3);
    assert_eq!(summary.committed_batches, 3);
    assert_eq!(summary.committed_rows, 250);
    assert_eq!(target.rows(), orders(1..=250));
}

#[tokio::test]
async fn test_aborted_batch_leaves_other_batches_committed() {
    let dir = TempDir::new().unwrap();
    let path = export_document(orders(1..=250), &dir).await;

    let target = MemoryTable::new();
    target.inject_insert_failure(150);
    let mut coordinator =
        CommitCoordinator::new(Arc::new(target.clone()), load_settings(CommitStrategy::Barrier));

    let summary = BulkImportReader::new(100)
        .read_all(reader(&path), &mut coordinator)
        .await
        .unwrap();

    assert!(!summary.is_complete());
    assert_eq!(summary.committed_batches, 2);
    assert_eq!(summary.aborted_batches, 1);
    assert_eq!(summary.aborted_rows, 100);

    // Batch two (keys 101..=200) is all or nothing
    let keys: Vec<i64> = target.rows().iter().map(|r| r.key).collect();
    assert_eq!(keys.len(), 150);
    assert!(keys.iter().all(|&k| k <= 100 || k > 200));
}

#[tokio::test]
async fn test_stop_on_abort_leaves_rest_unread() {
    let dir = TempDir::new().unwrap();
    let path = export_document(orders(1..=250), &dir).await;

    let target = MemoryTable::new();
    target.inject_insert_failure(42);
    let mut coordinator =
        CommitCoordinator::new(Arc::new(target.clone()), load_settings(CommitStrategy::Latch));

    let summary = BulkImportReader::new(100)
        .with_stop_on_abort(true)
        .read_all(reader(&path), &mut coordinator)
        .await
        .unwrap();

    assert!(summary.stopped_early);
    assert_eq!(summary.batches, 1);
    assert!(target.is_empty());
}

#[tokio::test]
async fn test_truncated_document_fails_after_loaded_batches() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("truncated.jsonl");

    let mut writer = JsonlWorkbookWriter::create(&path).unwrap();
    for (i, page) in orders(1..=25).chunks(10).enumerate() {
        let sheet = SheetPartition::for_page("orders", i).unwrap();
        writer.write_sheet(&sheet, page).unwrap();
    }
    // No finish(): the end trailer is never written
    drop(writer);

    let target = MemoryTable::new();
    let mut coordinator =
        CommitCoordinator::new(Arc::new(target.clone()), load_settings(CommitStrategy::Barrier));

    let result = BulkImportReader::new(10)
        .read_all(reader(&path), &mut coordinator)
        .await;

    assert!(matches!(result, Err(TransferError::Document(_))));
    assert_eq!(target.rows(), orders(1..=20));
}

#[tokio::test]
async fn test_shutdown_before_start_loads_nothing() {
    let dir = TempDir::new().unwrap();
    let path = export_document(orders(1..=50), &dir).await;

    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let target = MemoryTable::new();
    let mut coordinator =
        CommitCoordinator::new(Arc::new(target.clone()), load_settings(CommitStrategy::Barrier));

    let summary = BulkImportReader::new(10)
        .with_shutdown(rx)
        .read_all(reader(&path), &mut coordinator)
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.batches, 0);
    assert!(target.is_empty());
}

#[tokio::test]
async fn test_reimport_into_populated_table_aborts() {
    let dir = TempDir::new().unwrap();
    let path = export_document(orders(1..=30), &dir).await;

    // Key 17 already exists; its partition hits a unique violation
    let target = MemoryTable::with_rows(orders(17..=17));
    let mut coordinator =
        CommitCoordinator::new(Arc::new(target.clone()), load_settings(CommitStrategy::Latch));

    let summary = BulkImportReader::new(30)
        .read_all(reader(&path), &mut coordinator)
        .await
        .unwrap();

    assert_eq!(summary.aborted_batches, 1);
    assert_eq!(target.len(), 1);
}
