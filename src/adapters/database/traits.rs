//! Database abstraction traits
//!
//! The export side reads through [`RecordSource`]; the import side writes
//! through [`BulkWriter`], which hands out one [`Transaction`] per partition.

use crate::domain::{Record, RecordKey, Result};
use async_trait::async_trait;

/// Read side of a relational table
///
/// Implementations must be safe to call from many tasks at once; every call
/// may check out its own connection.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Total number of rows in the table
    async fn count(&self) -> Result<u64>;

    /// Rows `[offset, offset + limit)` in key order
    async fn fetch_offset(&self, offset: u64, limit: usize) -> Result<Vec<Record>>;

    /// Up to `limit` rows with key strictly greater than `after`, in key order
    ///
    /// `None` starts from the smallest key.
    async fn fetch_after(&self, after: Option<RecordKey>, limit: usize) -> Result<Vec<Record>>;
}

/// Write side of a relational table
#[async_trait]
pub trait BulkWriter: Send + Sync {
    /// Open a transaction on a dedicated connection
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::TransferError::Database`] if no connection can
    /// be obtained or `BEGIN` fails.
    async fn begin(&self) -> Result<Box<dyn Transaction>>;
}

/// An open transaction owned by exactly one worker
///
/// Must end in exactly one of [`commit`](Transaction::commit) or
/// [`rollback`](Transaction::rollback). Dropping an unresolved transaction
/// discards its writes.
#[async_trait]
pub trait Transaction: Send {
    /// Insert rows, returning the number of rows affected
    async fn bulk_insert(&mut self, rows: &[Record]) -> Result<u64>;

    /// Make the inserted rows durable
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discard the inserted rows
    async fn rollback(self: Box<Self>) -> Result<()>;
}
