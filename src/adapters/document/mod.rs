//! Workbook document encoding
//!
//! The export engine only needs a [`SheetWriter`]: something that accepts
//! rows under a named sheet and is finalized once. The JSON-lines workbook in
//! [`jsonl`] is the bundled encoder and decoder.

pub mod jsonl;

use crate::domain::{Record, Result, SheetPartition};

pub use jsonl::{JsonlWorkbookReader, JsonlWorkbookWriter, WorkbookLine};

/// Totals reported when a document is finalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DocumentStats {
    /// Sheets written
    pub sheets: usize,
    /// Rows written across all sheets
    pub rows: u64,
}

/// Encoder for a multi-sheet document
///
/// Not thread-safe by contract: callers serialize access (see
/// [`crate::core::export::SerializedSheetWriter`]).
pub trait SheetWriter: Send {
    /// Write `rows` as the full contents of `sheet`
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::TransferError::SinkWrite`] if the sheet was
    /// already written or the underlying writer fails.
    fn write_sheet(&mut self, sheet: &SheetPartition, rows: &[Record]) -> Result<()>;

    /// Finalize the document
    ///
    /// A document that was never finished is truncated.
    fn finish(self: Box<Self>) -> Result<DocumentStats>;
}
