//! Monotonic time sources for sampling loops.
//!
//! Every observation in the timing and trace loops is stamped through a
//! [`TimeSource`] so that tests can substitute a deterministic clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Trait representing a monotonic time source.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default time source backed by `Instant::now`.
#[derive(Debug, Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Deterministic time source for tests and replays.
///
/// Each call to `now()` returns the current virtual instant and then advances
/// it by a fixed step, so a loop that stamps once per sample sees evenly
/// spaced timestamps.
#[derive(Debug)]
pub struct SteppedTimeSource {
    start: Instant,
    step_ns: u64,
    ticks: AtomicU64,
}

impl SteppedTimeSource {
    pub fn new(step: Duration) -> Self {
        Self {
            start: Instant::now(),
            step_ns: u64::try_from(step.as_nanos()).unwrap_or(u64::MAX),
            ticks: AtomicU64::new(0),
        }
    }

    /// The instant returned by the first call to `now()`.
    pub fn origin(&self) -> Instant {
        self.start
    }

    /// Number of times `now()` has been called.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }
}

impl TimeSource for SteppedTimeSource {
    fn now(&self) -> Instant {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        self.start + Duration::from_nanos(tick.saturating_mul(self.step_ns))
    }
}
