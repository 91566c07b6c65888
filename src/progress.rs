use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::ProgressSnapshot;

/// Counts probed addresses for one scan. Integers only; percentages are left
/// to the consumer.
#[derive(Debug)]
pub struct ProgressTracker {
    processed: AtomicU64,
    total: u64,
}

impl ProgressTracker {
    pub fn new(total: u64) -> Self {
        Self {
            processed: AtomicU64::new(0),
            total,
        }
    }

    /// Record one finished probe and return the post-increment count.
    /// Saturates at `total`.
    pub fn increment(&self) -> u64 {
        let total = self.total;
        match self
            .processed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < total).then_some(n + 1)
            }) {
            Ok(prev) => prev + 1,
            Err(at_total) => at_total,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            processed: self.processed.load(Ordering::Acquire),
            total: self.total,
        }
    }
}
