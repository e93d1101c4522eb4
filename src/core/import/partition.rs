//! Batch partitioning
//!
//! A batch of `len` rows is cut into `count` contiguous ranges of `len / count`
//! rows, with the remainder folded into the last range. `count` is clamped to
//! `[1, len]` so no partition is ever empty.

use crate::domain::{Partition, Record};
use std::ops::Range;

/// Partition count actually used for a batch of `len` rows
pub fn effective_partition_count(len: usize, requested: usize) -> usize {
    requested.clamp(1, len.max(1))
}

/// Index ranges of each partition
///
/// The ranges are disjoint, ordered and cover `0..len` exactly.
pub fn partition_ranges(len: usize, requested: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let count = effective_partition_count(len, requested);
    let base = len / count;

    (0..count)
        .map(|i| {
            let start = i * base;
            let end = if i + 1 == count { len } else { start + base };
            start..end
        })
        .collect()
}

/// Split a batch into partitions without copying rows
pub fn split_batch(batch: Vec<Record>, requested: usize) -> Vec<Partition> {
    let ranges = partition_ranges(batch.len(), requested);
    let mut rest = batch;
    let mut partitions = Vec::with_capacity(ranges.len());

    for (id, range) in ranges.iter().enumerate().rev() {
        let rows = rest.split_off(range.start);
        partitions.push(Partition { id, rows });
    }
    partitions.reverse();
    partitions
}
