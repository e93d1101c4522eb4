//! Core transfer logic for sheetbridge.
//!
//! # Modules
//!
//! - [`pager`] - Offset and keyset page reads with retry
//! - [`export`] - Parallel paged export into a serialized document writer
//! - [`import`] - Batched, partitioned bulk load with an all-or-nothing decision
//!
//! # Export Workflow
//!
//! 1. **Count**: Read the row count once
//! 2. **Page**: Fetch pages in parallel (offset) or in key order (keyset)
//! 3. **Write**: Hand each page to the sink actor as its own sheet
//! 4. **Finalize**: Write the document trailer, or abandon it on failure
//!
//! # Import Workflow
//!
//! 1. **Read**: Pull at most `batch_size` records from the document
//! 2. **Partition**: Split the batch into disjoint slices
//! 3. **Attempt**: Insert every slice in its own transaction, in parallel
//! 4. **Decide**: Converge at the rendezvous and derive one decision
//! 5. **Resolve**: Every slice commits, or every slice rolls back
//!
//! # Example
//!
//! ```rust,no_run
//! use sheetbridge::adapters::memory::MemoryTable;
//! use sheetbridge::config::ImportConfig;
//! use sheetbridge::core::import::{CommitCoordinator, LoadSettings};
//! use sheetbridge::domain::Record;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let table = MemoryTable::new();
//! let settings = LoadSettings::from(&ImportConfig::default());
//! let mut coordinator = CommitCoordinator::new(Arc::new(table.clone()), settings);
//!
//! let batch = (0..100).map(Record::new).collect();
//! let report = coordinator.load_batch(batch).await?;
//!
//! println!("Decision: {}", report.decision);
//! # Ok(())
//! # }
//! ```

pub mod export;
pub mod import;
pub mod pager;
