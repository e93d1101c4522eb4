//! Domain models and types for sheetbridge.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Tabular data** ([`Record`], [`Page`])
//! - **Coordination state** ([`Partition`], [`WorkOutcome`], [`GlobalDecision`], [`SheetPartition`])
//! - **Validated names** ([`SheetName`], [`SqlIdentifier`])
//! - **Error types** ([`TransferError`]) and the [`Result`] alias
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, TransferError>`]:
//!
//! ```rust
//! use sheetbridge::domain::{Result, TransferError};
//!
//! fn require_rows(count: u64) -> Result<u64> {
//!     if count == 0 {
//!         return Err(TransferError::EmptySource("table is empty".to_string()));
//!     }
//!     Ok(count)
//! }
//! # assert!(require_rows(0).is_err());
//! ```

pub mod errors;
pub mod ids;
pub mod partition;
pub mod record;
pub mod result;

// Re-export commonly used types for convenience
pub use errors::TransferError;
pub use ids::{SheetName, SqlIdentifier};
pub use partition::{GlobalDecision, Partition, SheetPartition, WorkOutcome};
pub use record::{Page, Record, RecordKey};
pub use result::Result;
