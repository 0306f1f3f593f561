//! Batch outcome statistics and the end-of-batch summary.

use std::fmt;
use std::time::{Duration, Instant};

/// Final, immutable summary of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// Number of jobs in the batch.
    pub total: usize,
    /// Jobs that reached `Done`.
    pub succeeded: usize,
    /// Jobs that reached `Failed`.
    pub failed: usize,
    /// Jobs that reached `Cancelled`.
    pub cancelled: usize,
    /// Bytes saved to disk across successful jobs.
    pub total_bytes: u64,
    /// Wall time from the first job's start to the end of the last one.
    pub elapsed: Duration,
}

impl BatchSummary {
    /// Returns true if every job succeeded.
    #[must_use]
    pub const fn all_succeeded(&self) -> bool {
        self.succeeded == self.total
    }

    /// Number of jobs that did not succeed.
    #[must_use]
    pub const fn unsuccessful(&self) -> usize {
        self.total - self.succeeded
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.all_succeeded() {
            f.write_str("All downloads completed!")
        } else {
            write!(f, "{}/{} succeeded", self.succeeded, self.total)
        }
    }
}

/// Accumulates job outcomes while a batch runs.
#[derive(Debug)]
pub struct BatchStatsBuilder {
    start_time: Instant,
    total: usize,
    succeeded: usize,
    failed: usize,
    cancelled: usize,
    total_bytes: u64,
}

impl BatchStatsBuilder {
    /// Starts tracking a batch of `total` jobs.
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            start_time: Instant::now(),
            total,
            succeeded: 0,
            failed: 0,
            cancelled: 0,
            total_bytes: 0,
        }
    }

    /// Records a successful job that saved `bytes`.
    pub const fn add_success(&mut self, bytes: u64) {
        self.succeeded += 1;
        self.total_bytes += bytes;
    }

    /// Records a failed job.
    pub const fn add_failure(&mut self) {
        self.failed += 1;
    }

    /// Records a cancelled job.
    pub const fn add_cancelled(&mut self) {
        self.cancelled += 1;
    }

    /// Freezes the counters into a summary.
    #[must_use]
    pub fn build(self) -> BatchSummary {
        BatchSummary {
            total: self.total,
            succeeded: self.succeeded,
            failed: self.failed,
            cancelled: self.cancelled,
            total_bytes: self.total_bytes,
            elapsed: self.start_time.elapsed(),
        }
    }
}
