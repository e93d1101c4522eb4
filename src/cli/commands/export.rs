//! Export command implementation
//!
//! This module implements the `export` command, which writes the configured
//! table to a workbook document. The document is written next to its final
//! path with a `.partial` suffix and only renamed once it has been finalized,
//! so an interrupted or failed export never leaves a document that looks
//! complete.

use super::connect;
use crate::adapters::document::JsonlWorkbookWriter;
use crate::cli::{EXIT_CONFIG, EXIT_CONNECTION, EXIT_FATAL, EXIT_INTERRUPTED, EXIT_OK};
use crate::config::{load_config, ExportConfig, PaginationPolicy};
use crate::core::export::{ExportEngine, ExportSettings};
use crate::core::pager::KeysetPager;
use crate::log_error_with_context;
use clap::Args;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use uuid::Uuid;

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Path of the workbook document to write
    #[arg(short, long)]
    pub output: PathBuf,

    /// Override pagination policy (offset or keyset)
    #[arg(long)]
    pub pagination: Option<String>,

    /// Override rows per page
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Override number of concurrent page tasks
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

impl ExportArgs {
    /// Execute the export command
    pub async fn execute(
        &self,
        config_path: &str,
        mut shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        let run_id = Uuid::new_v4();
        tracing::info!(%run_id, output = %self.output.display(), "Starting export command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        if let Err(e) = self.apply_overrides(&mut config.export) {
            eprintln!("{e}");
            return Ok(EXIT_CONFIG);
        }

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(EXIT_CONFIG);
        }

        if !self.yes {
            println!("Export Configuration:");
            println!("  Table: {}", config.database.table);
            println!("  Output: {}", self.output.display());
            println!("  Pagination: {}", config.export.pagination);
            println!("  Page size: {}", config.export.page_size);
            println!("  Concurrency: {}", config.export.concurrency);
            println!();
            print!("Proceed with export? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Export cancelled.");
                return Ok(EXIT_OK);
            }
        }

        let adapter = match connect(&config).await {
            Ok(adapter) => adapter,
            Err(e) => {
                tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                eprintln!("Failed to initialize export: {e}");
                return Ok(EXIT_CONNECTION);
            }
        };

        let partial = partial_path(&self.output);
        let writer = match JsonlWorkbookWriter::create(&partial) {
            Ok(w) => w,
            Err(e) => {
                eprintln!("Failed to create output document: {e}");
                return Ok(EXIT_FATAL);
            }
        };

        let pager = KeysetPager::new(adapter, config.export.retry.clone());
        let engine = ExportEngine::new(pager, ExportSettings::from(&config.export));

        println!("🚀 Starting export...");
        println!();

        let result = tokio::select! {
            result = engine.export(Box::new(writer)) => Some(result),
            _ = shutdown_signal.wait_for(|stop| *stop) => None,
        };

        let summary = match result {
            None => {
                discard(&partial);
                tracing::info!(%run_id, "Export interrupted by user signal");
                println!();
                println!("⚠️  Export interrupted. No document was written.");
                return Ok(EXIT_INTERRUPTED);
            }
            Some(Err(e)) => {
                log_error_with_context!(&e, "Export failed");
                discard(&partial);
                eprintln!("Export failed: {e}");
                return Ok(EXIT_FATAL);
            }
            Some(Ok(summary)) => summary,
        };

        if let Err(e) = std::fs::rename(&partial, &self.output) {
            tracing::error!(error = %e, "Failed to move finalized document into place");
            eprintln!(
                "Export finished but {} could not be renamed to {}: {e}",
                partial.display(),
                self.output.display()
            );
            return Ok(EXIT_FATAL);
        }

        println!("📊 Export Summary:");
        println!("  Run: {run_id}");
        println!("  Pagination: {}", summary.policy);
        println!("  Rows counted: {}", summary.expected_rows);
        println!("  Rows written: {}", summary.rows_written);
        println!("  Sheets: {}", summary.sheets);
        println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
        println!("  Throughput: {:.0} rows/s", summary.rows_per_second());
        println!();
        if summary.count_drifted() {
            println!("⚠️  The table changed while exporting; row counts differ.");
        }
        println!("✅ Export written to {}", self.output.display());

        Ok(EXIT_OK)
    }

    fn apply_overrides(&self, export: &mut ExportConfig) -> Result<(), String> {
        if let Some(pagination) = &self.pagination {
            let policy: PaginationPolicy = pagination.parse()?;
            tracing::info!(pagination = %policy, "Overriding pagination policy from CLI");
            export.pagination = policy;
        }
        if let Some(page_size) = self.page_size {
            tracing::info!(page_size, "Overriding page size from CLI");
            export.page_size = page_size;
        }
        if let Some(concurrency) = self.concurrency {
            tracing::info!(concurrency, "Overriding concurrency from CLI");
            export.concurrency = concurrency;
        }
        Ok(())
    }
}

/// `{output}.partial`
fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}

fn discard(partial: &Path) {
    if let Err(e) = std::fs::remove_file(partial) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(
                path = %partial.display(),
                error = %e,
                "Failed to remove unfinished document"
            );
        }
    }
}
