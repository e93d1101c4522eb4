//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the sheetbridge configuration file.

use crate::adapters::postgresql::client::redact_connection_string;
use crate::cli::{EXIT_CONFIG, EXIT_OK};
use crate::config::load_config;
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    ///
    /// Loading already validates, so a loaded configuration is a valid one.
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                return Ok(EXIT_CONFIG);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);
        println!(
            "  PostgreSQL Connection: {}",
            redact_connection_string(config.database.connection_string.expose_secret().as_ref())
        );
        println!("  Table: {}", config.database.table);
        println!("  Key Column: {}", config.database.key_column);
        println!("  Max Connections: {}", config.database.max_connections);
        println!("  Export Pagination: {}", config.export.pagination);
        println!("  Export Page Size: {}", config.export.page_size);
        println!("  Export Concurrency: {}", config.export.concurrency);
        println!("  Import Batch Size: {}", config.import.batch_size);
        println!("  Import Partitions: {}", config.import.partition_count);
        println!("  Commit Strategy: {}", config.import.commit_strategy);
        println!();
        Ok(EXIT_OK)
    }
}
