//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for sheetbridge using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Exit code: success
pub const EXIT_OK: i32 = 0;
/// Exit code: finished, but some batches were aborted or partially committed
pub const EXIT_PARTIAL: i32 = 1;
/// Exit code: configuration error
pub const EXIT_CONFIG: i32 = 2;
/// Exit code: database unreachable
pub const EXIT_CONNECTION: i32 = 4;
/// Exit code: fatal error
pub const EXIT_FATAL: i32 = 5;
/// Exit code: interrupted by a signal
pub const EXIT_INTERRUPTED: i32 = 130;

/// sheetbridge - parallel table to workbook transfer
#[derive(Parser, Debug)]
#[command(name = "sheetbridge")]
#[command(version, about, long_about = None)]
#[command(author = "Sheetbridge Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "sheetbridge.toml",
        env = "SHEETBRIDGE_CONFIG"
    )]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "SHEETBRIDGE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export the configured table into a workbook document
    Export(commands::export::ExportArgs),

    /// Import a workbook document into the configured table
    Import(commands::import::ImportArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
