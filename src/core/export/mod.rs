//! Parallel paged export
//!
//! - [`ExportEngine`] - fans page reads out over a bounded task pool
//! - [`SerializedSheetWriter`] - single-owner sink actor around the document encoder
//! - [`ExportSummary`] - what was written and how long it took

pub mod engine;
pub mod sheet_writer;
pub mod summary;

pub use engine::{ExportEngine, ExportSettings};
pub use sheet_writer::{SerializedSheetWriter, SheetWriterHandle};
pub use summary::ExportSummary;
