//! Import command implementation
//!
//! This module implements the `import` command, which loads a workbook
//! document into the configured table batch by batch. Each batch is loaded
//! across parallel partitions and either fully committed or fully rolled back.

use super::connect;
use crate::adapters::database::BulkWriter;
use crate::adapters::document::JsonlWorkbookReader;
use crate::adapters::memory::MemoryTable;
use crate::cli::{
    EXIT_CONFIG, EXIT_CONNECTION, EXIT_FATAL, EXIT_INTERRUPTED, EXIT_OK, EXIT_PARTIAL,
};
use crate::config::{load_config, CommitStrategy, ImportConfig};
use crate::core::import::{BulkImportReader, CommitCoordinator, LoadSettings};
use crate::log_error_with_context;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// Arguments for the import command
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Workbook document to import
    pub input: PathBuf,

    /// Override records per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Override partitions per batch
    #[arg(long)]
    pub partitions: Option<usize>,

    /// Override commit strategy (barrier or latch)
    #[arg(long)]
    pub strategy: Option<String>,

    /// Dry run mode - load into an in-memory table instead of PostgreSQL
    #[arg(long)]
    pub dry_run: bool,
}

impl ImportArgs {
    /// Execute the import command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        let run_id = Uuid::new_v4();
        tracing::info!(%run_id, input = %self.input.display(), "Starting import command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        if let Err(e) = self.apply_overrides(&mut config.import) {
            eprintln!("{e}");
            return Ok(EXIT_CONFIG);
        }
        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(EXIT_CONFIG);
        }

        let dry_run_table = config.application.dry_run.then(MemoryTable::new);
        let writer: Arc<dyn BulkWriter> = match &dry_run_table {
            Some(table) => {
                tracing::info!("Dry run mode enabled - rows load into memory only");
                println!("🔍 DRY RUN MODE - No data will be written to the database");
                println!();
                Arc::new(table.clone())
            }
            None => match connect(&config).await {
                Ok(adapter) => adapter,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                    eprintln!("Failed to initialize import: {e}");
                    return Ok(EXIT_CONNECTION);
                }
            },
        };

        let records = match JsonlWorkbookReader::open(&self.input) {
            Ok(reader) => reader,
            Err(e) => {
                eprintln!("Failed to open input document: {e}");
                return Ok(EXIT_FATAL);
            }
        };

        let mut coordinator = CommitCoordinator::new(writer, LoadSettings::from(&config.import));
        let reader = BulkImportReader::from(&config.import).with_shutdown(shutdown_signal);

        println!("🚀 Starting import...");
        println!();

        let summary = match reader.read_all(records, &mut coordinator).await {
            Ok(summary) => summary,
            Err(e) => {
                log_error_with_context!(&e, "Import failed");
                eprintln!("Import failed: {e}");
                return Ok(EXIT_FATAL);
            }
        };

        println!("📊 Import Summary:");
        println!("  Run: {run_id}");
        println!("  Strategy: {}", config.import.commit_strategy);
        println!("  Batches: {}", summary.batches);
        println!("  Committed batches: {}", summary.committed_batches);
        println!("  Aborted batches: {}", summary.aborted_batches);
        println!("  Committed rows: {}", summary.committed_rows);
        println!("  Aborted rows: {}", summary.aborted_rows);
        println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
        if let Some(table) = &dry_run_table {
            println!("  Rows in dry-run table: {}", table.len());
        }
        println!();

        let exit_code = if summary.interrupted {
            println!("⚠️  Import interrupted after batch {}.", summary.batches);
            println!("   Every loaded batch was fully committed or fully rolled back.");
            EXIT_INTERRUPTED
        } else if summary.is_complete() {
            println!("✅ Import completed successfully!");
            EXIT_OK
        } else {
            if summary.commit_failures > 0 {
                println!(
                    "❌ {} partition(s) failed to commit after a COMMIT decision; the table may hold part of a batch.",
                    summary.commit_failures
                );
            }
            println!("⚠️  Import completed with aborted batches");
            EXIT_PARTIAL
        };

        Ok(exit_code)
    }

    fn apply_overrides(&self, import: &mut ImportConfig) -> Result<(), String> {
        if let Some(batch_size) = self.batch_size {
            tracing::info!(batch_size, "Overriding batch size from CLI");
            import.batch_size = batch_size;
        }
        if let Some(partitions) = self.partitions {
            tracing::info!(partitions, "Overriding partition count from CLI");
            import.partition_count = partitions;
        }
        if let Some(strategy) = &self.strategy {
            let strategy: CommitStrategy = strategy.parse()?;
            tracing::info!(strategy = %strategy, "Overriding commit strategy from CLI");
            import.commit_strategy = strategy;
        }
        Ok(())
    }
}
