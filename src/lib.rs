// sheetbridge - Parallel table to workbook transfer
// Copyright (c) 2025 Sheetbridge Contributors
// Licensed under the MIT License

//! # sheetbridge - Parallel table to workbook transfer
//!
//! sheetbridge moves one relational table to and from a multi-sheet workbook
//! document, in parallel, without giving up consistency on the way in.
//!
//! ## Overview
//!
//! This library provides:
//! - **Export**: pages of the table are fetched by a bounded pool of tasks
//!   and written as one sheet each through a single serialized writer
//! - **Import**: the document is read in bounded batches, and each batch is
//!   inserted across parallel transactions that all commit or all roll back
//! - **Pagination**: offset pages fetched in parallel, or keyset pages that
//!   stay correct while rows are appended
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Pager, export engine, commit coordinator, import reader
//! - [`adapters`] - PostgreSQL, in-memory table, JSON-lines workbook
//! - [`domain`] - Records, partitions, decisions and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sheetbridge::adapters::document::JsonlWorkbookWriter;
//! use sheetbridge::adapters::memory::MemoryTable;
//! use sheetbridge::config::{ExportConfig, RetryConfig};
//! use sheetbridge::core::export::{ExportEngine, ExportSettings};
//! use sheetbridge::core::pager::KeysetPager;
//! use sheetbridge::domain::Record;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let table = MemoryTable::with_rows((1..=25).map(Record::new));
//!     let pager = KeysetPager::new(Arc::new(table), RetryConfig::default());
//!     let engine = ExportEngine::new(pager, ExportSettings::from(&ExportConfig::default()));
//!
//!     let writer = JsonlWorkbookWriter::create("users.jsonl")?;
//!     let summary = engine.export(Box::new(writer)).await?;
//!
//!     println!("Exported {} rows in {} sheets", summary.rows_written, summary.sheets);
//!     Ok(())
//! }
//! ```
//!
//! ## All-or-nothing batches
//!
//! Each import batch runs in two phases. Every partition first inserts its
//! rows in its own transaction and reports success or failure. Once all have
//! reported, or the rendezvous times out, one decision is derived and every
//! partition commits or rolls back accordingly:
//!
//! ```rust,no_run
//! use sheetbridge::adapters::memory::MemoryTable;
//! use sheetbridge::config::ImportConfig;
//! use sheetbridge::core::import::{CommitCoordinator, LoadSettings};
//! use sheetbridge::domain::{GlobalDecision, Record};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let table = MemoryTable::new();
//! let mut coordinator =
//!     CommitCoordinator::new(Arc::new(table.clone()), LoadSettings::from(&ImportConfig::default()));
//!
//! let report = coordinator.load_batch((0..23).map(Record::new).collect()).await?;
//! assert_eq!(report.decision, GlobalDecision::Commit);
//! # Ok(())
//! # }
//! ```
//!
//! The partitions are still separate transactions: a `COMMIT` that fails
//! after the decision cannot be undone on the partitions that already
//! committed. [`core::import::LoadReport::commit_failures`] reports it.
//!
//! ## Error Handling
//!
//! The library uses [`domain::TransferError`] for all errors:
//!
//! ```rust,no_run
//! use sheetbridge::domain::TransferError;
//!
//! fn example() -> Result<(), TransferError> {
//!     let config = sheetbridge::config::load_config("sheetbridge.toml")?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
