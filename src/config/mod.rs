//! Configuration management for sheetbridge.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! sheetbridge uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `SHEETBRIDGE_<SECTION>_<KEY>` overrides
//! - Default values for optional settings
//! - Cross-field validation (the pool must cover every concurrent worker)
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sheetbridge::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("sheetbridge.toml")?;
//!
//! println!("Table: {}", config.database.table);
//! println!("Pagination: {}", config.export.pagination);
//! println!("Commit strategy: {}", config.import.commit_strategy);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and dry-run flag
//! - [`DatabaseConfig`] - PostgreSQL connection, table and key column
//! - [`ExportConfig`] - Page size, concurrency, pagination policy, retries
//! - [`ImportConfig`] - Batch size, partitions, commit strategy, timeouts
//! - [`LoggingConfig`] - Local file logging
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [database]
//! connection_string = "${SHEETBRIDGE_DATABASE_URL}"
//! table = "users"
//! key_column = "id"
//! max_connections = 32
//!
//! [export]
//! page_size = 10000
//! concurrency = 8
//! pagination = "offset"
//!
//! [import]
//! batch_size = 200000
//! partition_count = 20
//! commit_strategy = "barrier"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_config, load_config_str};
pub use schema::{
    ApplicationConfig, CommitStrategy, DatabaseConfig, ExportConfig, ImportConfig, LoggingConfig,
    PaginationPolicy, RetryConfig, TransferConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
