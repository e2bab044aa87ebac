// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Fixed-size partitioning of the record sequence.
//!
//! Batches are plain offset ranges over the loaded records, so retries of a
//! batch always resend exactly the same records in the same order.
//!
//! # Example
//!
//! ```
//! use lead_sync::batching::partition;
//!
//! let batches = partition(120, 50);
//! let sizes: Vec<_> = batches.iter().map(|b| b.count).collect();
//! assert_eq!(sizes, vec![50, 50, 20]);
//! ```

use std::ops::Range;

/// One contiguous slice of the record sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    /// 0-based batch number
    pub index: usize,
    /// Offset of the first record
    pub start: usize,
    /// Number of records
    pub count: usize,
}

impl Batch {
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.count
    }

    /// The records of this batch. Empty if `records` is shorter than expected.
    #[must_use]
    pub fn slice<'a, T>(&self, records: &'a [T]) -> &'a [T] {
        records.get(self.range()).unwrap_or(&[])
    }
}

/// How a batch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Pending,
    Succeeded,
    /// Every permitted attempt failed
    Exhausted,
}

impl BatchOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Exhausted => "exhausted",
        }
    }
}

/// Number of batches for `total` records: `ceil(total / batch_size)`.
#[must_use]
pub fn batch_count(total: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    total.div_ceil(batch_size)
}

/// Split `total` records into batches of at most `batch_size`, in order.
#[must_use]
pub fn partition(total: usize, batch_size: usize) -> Vec<Batch> {
    (0..batch_count(total, batch_size))
        .map(|index| {
            let start = index * batch_size;
            Batch {
                index,
                start,
                count: batch_size.min(total - start),
            }
        })
        .collect()
}
