//! Partitioned bulk import
//!
//! - [`BulkImportReader`] - streams a record source in bounded batches
//! - [`CommitCoordinator`] - loads one batch across parallel partitions so
//!   that every partition commits or none does
//! - [`rendezvous`] - the barrier and latch strategies workers converge on
//! - [`partition`] - splitting a batch into disjoint partitions
//! - [`ImportSummary`] - totals across all batches

pub mod coordinator;
pub mod partition;
pub mod reader;
pub mod rendezvous;
pub mod summary;

pub use coordinator::{
    CommitCoordinator, LoadReport, LoadSettings, PartitionReport, PartitionResolution,
};
pub use reader::{BatchLoader, BulkImportReader};
pub use rendezvous::{BarrierRendezvous, LatchRendezvous, Rendezvous};
pub use summary::ImportSummary;
