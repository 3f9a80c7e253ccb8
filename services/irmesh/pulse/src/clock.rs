//! Microsecond timestamps for edge capture.

use once_cell::sync::Lazy;
use std::time::Instant;

/// Source of monotonic microsecond timestamps
pub trait Clock: Send + Sync {
    /// Microseconds since an arbitrary fixed origin
    fn now_us(&self) -> u64;
}

/// Process-wide monotonic clock
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now_us(&self) -> u64 {
        static START: Lazy<Instant> = Lazy::new(Instant::now);
        START.elapsed().as_micros() as u64
    }
}
