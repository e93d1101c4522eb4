//! Logging and observability
//!
//! Structured logging through `tracing`, plus a handful of macros that give
//! the transfer events consistent field names.
//!
//! # Example
//!
//! ```no_run
//! use sheetbridge::logging::init_logging;
//! use sheetbridge::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log a sheet handed to the document writer
///
/// # Example
///
/// ```no_run
/// use sheetbridge::log_page_written;
///
/// log_page_written!(3, "users4", 1000);
/// ```
#[macro_export]
macro_rules! log_page_written {
    ($page:expr, $sheet:expr, $rows:expr) => {
        tracing::debug!(
            page = $page,
            sheet = %$sheet,
            rows = $rows,
            "Sheet written"
        );
    };
}

/// Log one partition's insert outcome
///
/// # Example
///
/// ```no_run
/// use sheetbridge::log_partition_outcome;
/// use sheetbridge::domain::WorkOutcome;
///
/// let outcome = WorkOutcome::failure(4, "duplicate key");
/// log_partition_outcome!(&outcome, 10_000);
/// ```
#[macro_export]
macro_rules! log_partition_outcome {
    ($outcome:expr, $rows:expr) => {
        if $outcome.succeeded {
            tracing::debug!(
                partition = $outcome.partition_id,
                rows = $rows,
                "Partition insert succeeded"
            );
        } else {
            tracing::warn!(
                partition = $outcome.partition_id,
                rows = $rows,
                error = $outcome.error.as_deref().unwrap_or("unknown"),
                "Partition insert failed"
            );
        }
    };
}

/// Log the global decision for a batch
///
/// # Example
///
/// ```no_run
/// use sheetbridge::log_global_decision;
/// use sheetbridge::domain::GlobalDecision;
///
/// log_global_decision!(0, GlobalDecision::Commit, 20, 0);
/// ```
#[macro_export]
macro_rules! log_global_decision {
    ($batch:expr, $decision:expr, $partitions:expr, $failed:expr) => {
        tracing::info!(
            batch = $batch,
            decision = %$decision,
            partitions = $partitions,
            failed = $failed,
            "Global decision reached"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use sheetbridge::log_error_with_context;
/// use sheetbridge::domain::TransferError;
///
/// let error = TransferError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use sheetbridge::log_retry_attempt;
///
/// log_retry_attempt!(2, 3, "Connection timeout");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = $reason,
            "Retrying operation"
        );
    };
}
