//! Partition, outcome and decision models
//!
//! These types carry the state of one partitioned bulk load and of one
//! partitioned export. Each worker exclusively owns its [`Partition`] and its
//! [`WorkOutcome`]; the [`GlobalDecision`] is derived from all outcomes and is
//! read-only once published.

use super::ids::SheetName;
use super::record::Record;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A contiguous, non-overlapping slice of a batch assigned to one worker
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Partition index within the batch, starting at 0
    pub id: usize,

    /// Rows of this slice, in batch order
    pub rows: Vec<Record>,
}

impl Partition {
    /// Number of rows in the partition
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the partition holds no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Result of one partition's insert attempt
///
/// Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkOutcome {
    /// Partition the outcome belongs to
    pub partition_id: usize,

    /// Whether the insert succeeded
    pub succeeded: bool,

    /// Failure description, if any
    pub error: Option<String>,
}

impl WorkOutcome {
    /// Successful attempt
    pub fn success(partition_id: usize) -> Self {
        Self {
            partition_id,
            succeeded: true,
            error: None,
        }
    }

    /// Failed attempt
    pub fn failure(partition_id: usize, error: impl Into<String>) -> Self {
        Self {
            partition_id,
            succeeded: false,
            error: Some(error.into()),
        }
    }
}

/// The single commit/abort verdict for one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalDecision {
    /// Every partition succeeded; all transactions commit
    Commit,
    /// At least one partition failed or never reported; all transactions roll back
    Abort,
}

impl GlobalDecision {
    /// Derive the decision from the recorded outcomes
    ///
    /// COMMIT only if `expected` outcomes were recorded and all of them
    /// succeeded. A missing outcome counts as a failure.
    pub fn from_outcomes(outcomes: &[WorkOutcome], expected: usize) -> Self {
        if outcomes.len() >= expected && outcomes.iter().all(|o| o.succeeded) {
            GlobalDecision::Commit
        } else {
            GlobalDecision::Abort
        }
    }

    /// Whether the decision is COMMIT
    pub fn is_commit(&self) -> bool {
        matches!(self, GlobalDecision::Commit)
    }

    /// Returns the decision as a lowercase string
    pub fn as_str(&self) -> &'static str {
        match self {
            GlobalDecision::Commit => "commit",
            GlobalDecision::Abort => "abort",
        }
    }
}

impl fmt::Display for GlobalDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a partition id to a named sub-resource of the output document
///
/// Created once per id, written once, never reopened.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SheetPartition {
    /// Partition id (the page index on export)
    pub id: usize,

    /// Sheet name inside the document
    pub name: SheetName,
}

impl SheetPartition {
    /// Create a sheet partition
    pub fn new(id: usize, name: SheetName) -> Self {
        Self { id, name }
    }

    /// Sheet partition for page `index`, named `{prefix}{index + 1}`
    pub fn for_page(prefix: &str, index: usize) -> Result<Self, String> {
        Ok(Self::new(index, SheetName::for_page(prefix, index)?))
    }
}
