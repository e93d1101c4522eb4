//! CLI command implementations
//!
//! This module contains all CLI command implementations.

pub mod export;
pub mod import;
pub mod init;
pub mod validate;

use crate::adapters::postgresql::{PostgreSQLAdapter, PostgreSQLClient};
use crate::config::TransferConfig;
use crate::domain::Result;
use std::sync::Arc;

/// Build the PostgreSQL adapter for the configured table and check connectivity
pub(crate) async fn connect(config: &TransferConfig) -> Result<Arc<PostgreSQLAdapter>> {
    let client = PostgreSQLClient::new(config.database.clone())?;
    client.test_connection().await?;
    tracing::debug!(pool = ?client.pool_status(), "Connection pool ready");
    Ok(Arc::new(PostgreSQLAdapter::new(
        client,
        config.database.table.clone(),
        config.database.key_column.clone(),
    )))
}
