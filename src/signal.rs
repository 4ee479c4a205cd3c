//! One-shot cooperative stop flag shared between a waiting task and a
//! sampling loop.
//!
//! The writer asserts the flag exactly once with `Release` ordering; readers
//! poll it with `Acquire`, which makes the assertion visible to the sampling
//! thread on its next check without any lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Clonable handle to a shared stop flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assert the signal. Returns `true` if this call performed the assertion.
    pub fn assert(&self) -> bool {
        !self.flag.swap(true, Ordering::AcqRel)
    }

    /// Non-blocking check, called once per loop iteration.
    pub fn is_asserted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
