//! External system integrations for sheetbridge.
//!
//! - [`database`] - Traits for the relational store (paged reads, transactional bulk writes)
//! - [`postgresql`] - PostgreSQL implementation
//! - [`memory`] - In-process table for dry runs and tests
//! - [`document`] - Workbook document encoder and decoder
//!
//! # Design Pattern
//!
//! Adapters isolate external dependencies behind traits so the transfer
//! engines can run against PostgreSQL or the in-memory table unchanged.
//!
//! ```rust
//! use sheetbridge::adapters::database::RecordSource;
//! use sheetbridge::adapters::memory::MemoryTable;
//! use sheetbridge::domain::Record;
//!
//! # async fn example() -> sheetbridge::domain::Result<()> {
//! let table = MemoryTable::with_rows((1..=3).map(Record::new));
//! assert_eq!(table.count().await?, 3);
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod document;
pub mod memory;
pub mod postgresql;
