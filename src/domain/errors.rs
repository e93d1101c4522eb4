//! Domain error types
//!
//! This module defines the error hierarchy for sheetbridge. All errors are
//! domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main sheetbridge error type
///
/// This is the primary error type used throughout the application. The
/// transfer-specific variants follow the failure taxonomy of the export and
/// import paths; the rest cover the ambient concerns.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Database connection or statement errors that are not tied to a page
    #[error("Database error: {0}")]
    Database(String),

    /// A page fetch from the relational source failed
    #[error("Source read failed: {0}")]
    SourceRead(String),

    /// Writing a partition to the shared document sink failed
    #[error("Sink write failed: {0}")]
    SinkWrite(String),

    /// One partition's insert failed during a bulk load
    #[error("Partition {partition_id} load failed: {message}")]
    PartitionLoad {
        /// Partition that failed
        partition_id: usize,
        /// Failure description
        message: String,
    },

    /// A worker did not reach the rendezvous point in time
    #[error("Coordination timed out: {0}")]
    CoordinationTimeout(String),

    /// No rows were available to load or export
    #[error("Empty source: {0}")]
    EmptySource(String),

    /// The workbook document is malformed or truncated
    #[error("Document error: {0}")]
    Document(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl TransferError {
    /// Whether retrying the failed operation may succeed
    ///
    /// Page fetches and plain database errors are transient from the engine's
    /// point of view. Sink, document and coordination failures are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransferError::SourceRead(_) | TransferError::Database(_)
        )
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for TransferError {
    fn from(err: std::io::Error) -> Self {
        TransferError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for TransferError {
    fn from(err: serde_json::Error) -> Self {
        TransferError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for TransferError {
    fn from(err: toml::de::Error) -> Self {
        TransferError::Configuration(format!("TOML parse error: {err}"))
    }
}
