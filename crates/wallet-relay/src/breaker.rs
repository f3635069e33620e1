//! Write halt after repeated storage failures.
//!
//! Counts consecutive failed puts. Once the threshold is reached the
//! relay refuses writes until an operator resumes them. Reads are not
//! affected.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tracing::{error, info};

/// Default number of consecutive storage failures before writes halt.
pub const DEFAULT_MAX_STORAGE_FAILURES: u32 = 3;

/// Write-path breaker.
#[derive(Debug)]
pub struct WriteBreaker {
    threshold: u32,
    consecutive_failures: AtomicU32,
    halted: AtomicBool,
}

impl WriteBreaker {
    /// Create a breaker that trips after `threshold` consecutive failures.
    /// A threshold of zero is treated as one.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive_failures: AtomicU32::new(0),
            halted: AtomicBool::new(false),
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    /// Record a successful write.
    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
    }

    /// Record a failed write. Returns true if this failure halted writes.
    pub fn record_failure(&self) -> bool {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        if failures >= self.threshold && !self.halted.swap(true, Ordering::AcqRel) {
            error!(failures, "storage failing repeatedly, halting writes");
            return true;
        }
        false
    }

    /// Clear the halt and the failure count.
    pub fn resume(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
        if self.halted.swap(false, Ordering::AcqRel) {
            info!("writes resumed");
        }
    }
}

impl Default for WriteBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STORAGE_FAILURES)
    }
}
