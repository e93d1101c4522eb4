//! Database abstraction layer
//!
//! Trait-based seams between the transfer engines and the relational store,
//! so the engines run unchanged against PostgreSQL or the in-memory table.

pub mod traits;

pub use traits::{BulkWriter, RecordSource, Transaction};
