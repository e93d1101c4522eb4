//! PostgreSQL database integration
//!
//! Paged reads and per-partition bulk-insert transactions against a single
//! table with a BIGINT key column.

pub mod adapter;
pub mod client;
pub mod models;

pub use adapter::{PgTransaction, PostgreSQLAdapter};
pub use client::PostgreSQLClient;
