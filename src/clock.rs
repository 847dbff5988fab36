//! Clock port (§6.1): a monotonic time source the core never calls
//! `SystemTime::now()` around directly, so tests can pin time the way the
//! teacher repo pins `SystemTime::now().duration_since(UNIX_EPOCH)` at a
//! single call site per operation rather than scattering it.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64
    }
}

/// Fixed-time clock for deterministic tests: pins `now_ms()` so a pinned
/// snapshot and its derived opportunities have a reproducible `created_at`.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_ms(&self) -> u64 {
        self.0
    }
}
