//! PostgreSQL adapter implementing the database traits

use crate::adapters::database::traits::{BulkWriter, RecordSource, Transaction};
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::adapters::postgresql::models::{record_from_row, rows_to_payload};
use crate::domain::{Record, RecordKey, Result, SqlIdentifier, TransferError};
use async_trait::async_trait;

/// PostgreSQL implementation of [`RecordSource`] and [`BulkWriter`] for one table
pub struct PostgreSQLAdapter {
    client: PostgreSQLClient,
    table: SqlIdentifier,
    key_column: SqlIdentifier,
}

impl PostgreSQLAdapter {
    /// Create a new PostgreSQL adapter
    pub fn new(client: PostgreSQLClient, table: SqlIdentifier, key_column: SqlIdentifier) -> Self {
        Self {
            client,
            table,
            key_column,
        }
    }

    // The key name appears once as a quoted identifier and once as the JSONB
    // key to strip, which must match the column name exactly.
    fn select_prefix(&self) -> String {
        format!(
            "SELECT t.{key}::bigint AS key, to_jsonb(t) - '{name}' AS fields FROM {table} t",
            key = self.key_column.quoted(),
            name = self.key_column.as_str(),
            table = self.table.quoted()
        )
    }

    fn offset_query(&self) -> String {
        format!(
            "{} ORDER BY t.{} LIMIT $1 OFFSET $2",
            self.select_prefix(),
            self.key_column.quoted()
        )
    }

    fn keyset_query(&self, has_cursor: bool) -> String {
        if has_cursor {
            format!(
                "{} WHERE t.{key} > $1 ORDER BY t.{key} LIMIT $2",
                self.select_prefix(),
                key = self.key_column.quoted()
            )
        } else {
            format!(
                "{} ORDER BY t.{} LIMIT $1",
                self.select_prefix(),
                self.key_column.quoted()
            )
        }
    }

    fn insert_statement(&self) -> String {
        format!(
            "INSERT INTO {table} SELECT * FROM jsonb_populate_recordset(NULL::{table}, $1)",
            table = self.table.quoted()
        )
    }
}

fn limit_param(limit: usize) -> Result<i64> {
    i64::try_from(limit)
        .map_err(|_| TransferError::SourceRead(format!("Page limit {limit} out of range")))
}

#[async_trait]
impl RecordSource for PostgreSQLAdapter {
    async fn count(&self) -> Result<u64> {
        let query = format!("SELECT COUNT(*) FROM {}", self.table.quoted());
        let rows = self.client.query(&query, &[]).await?;
        let count: i64 = rows
            .first()
            .ok_or_else(|| TransferError::SourceRead("COUNT returned no rows".to_string()))?
            .try_get(0)
            .map_err(|e| TransferError::SourceRead(format!("Invalid COUNT result: {e}")))?;
        Ok(count.max(0) as u64)
    }

    async fn fetch_offset(&self, offset: u64, limit: usize) -> Result<Vec<Record>> {
        let limit = limit_param(limit)?;
        let offset = i64::try_from(offset)
            .map_err(|_| TransferError::SourceRead(format!("Offset {offset} out of range")))?;

        let rows = self
            .client
            .query(&self.offset_query(), &[&limit, &offset])
            .await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn fetch_after(&self, after: Option<RecordKey>, limit: usize) -> Result<Vec<Record>> {
        let limit = limit_param(limit)?;

        let rows = match after {
            Some(key) => {
                self.client
                    .query(&self.keyset_query(true), &[&key, &limit])
                    .await?
            }
            None => {
                self.client
                    .query(&self.keyset_query(false), &[&limit])
                    .await?
            }
        };
        rows.iter().map(record_from_row).collect()
    }
}

#[async_trait]
impl BulkWriter for PostgreSQLAdapter {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let conn = self.client.begin().await?;
        Ok(Box::new(PgTransaction {
            conn: Some(conn),
            insert_statement: self.insert_statement(),
            key_column: self.key_column.clone(),
        }))
    }
}

/// A transaction pinned to one pooled connection
///
/// If dropped before commit or rollback, the connection is detached from the
/// pool and closed, which makes the server roll the transaction back.
pub struct PgTransaction {
    conn: Option<deadpool_postgres::Object>,
    insert_statement: String,
    key_column: SqlIdentifier,
}

impl PgTransaction {
    fn connection(&self) -> Result<&deadpool_postgres::Object> {
        self.conn
            .as_ref()
            .ok_or_else(|| TransferError::Database("Transaction already resolved".to_string()))
    }

    async fn finish(mut self: Box<Self>, statement: &str) -> Result<()> {
        let conn = self
            .conn
            .take()
            .ok_or_else(|| TransferError::Database("Transaction already resolved".to_string()))?;

        match conn.batch_execute(statement).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // Never hand a connection in an unknown transaction state back to the pool
                drop(deadpool_postgres::Object::take(conn));
                Err(TransferError::Database(format!("{statement} failed: {e}")))
            }
        }
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn bulk_insert(&mut self, rows: &[Record]) -> Result<u64> {
        let payload = rows_to_payload(rows, &self.key_column);
        let conn = self.connection()?;

        conn.execute(self.insert_statement.as_str(), &[&payload])
            .await
            .map_err(|e| TransferError::Database(format!("Bulk insert failed: {e}")))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for PgTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::warn!("Transaction dropped without commit or rollback; closing connection");
            drop(deadpool_postgres::Object::take(conn));
        }
    }
}
