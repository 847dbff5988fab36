//! Per-upstream-source circuit breaker (spec.md §4.1): `CLOSED -> OPEN ->
//! HALF_OPEN` state machine with atomic counters, per spec.md §5 ("Circuit
//! breaker counters are per-source atomics").

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BreakerState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl From<u8> for BreakerState {
    fn from(v: u8) -> Self {
        match v {
            1 => BreakerState::Open,
            2 => BreakerState::HalfOpen,
            _ => BreakerState::Closed,
        }
    }
}

/// Thresholds: 5 consecutive failures opens; open lasts 60s, then one
/// probe; success closes, failure re-opens.
pub struct CircuitBreaker {
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    opened_at_ms: AtomicU64,
    failure_threshold: u32,
    open_duration_ms: u64,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, open_duration_ms: u64) -> Self {
        Self {
            state: AtomicU8::new(BreakerState::Closed as u8),
            consecutive_failures: AtomicU32::new(0),
            opened_at_ms: AtomicU64::new(0),
            failure_threshold,
            open_duration_ms,
        }
    }

    pub fn state(&self) -> BreakerState {
        BreakerState::from(self.state.load(Ordering::SeqCst))
    }

    /// Whether a call should be attempted right now, given `now_ms`.
    /// `OPEN` transitions to `HALF_OPEN` (allowing exactly one probe) once
    /// `open_duration_ms` has elapsed.
    pub fn should_attempt(&self, now_ms: u64) -> bool {
        match self.state() {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let opened_at = self.opened_at_ms.load(Ordering::SeqCst);
                if now_ms.saturating_sub(opened_at) >= self.open_duration_ms {
                    self.state.store(BreakerState::HalfOpen as u8, Ordering::SeqCst);
                    eprintln!("[CIRCUIT-BREAKER] OPEN -> HALF_OPEN after {}ms", self.open_duration_ms);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        if self.state() != BreakerState::Closed {
            eprintln!("[CIRCUIT-BREAKER] -> CLOSED after successful probe");
        }
        self.state.store(BreakerState::Closed as u8, Ordering::SeqCst);
    }

    pub fn record_failure(&self, now_ms: u64) {
        match self.state() {
            BreakerState::HalfOpen => {
                self.trip(now_ms);
            }
            BreakerState::Closed => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= self.failure_threshold {
                    self.trip(now_ms);
                }
            }
            BreakerState::Open => {}
        }
    }

    fn trip(&self, now_ms: u64) {
        self.state.store(BreakerState::Open as u8, Ordering::SeqCst);
        self.opened_at_ms.store(now_ms, Ordering::SeqCst);
        eprintln!("[CIRCUIT-BREAKER] -> OPEN at t={now_ms}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_five_consecutive_failures() {
        let breaker = CircuitBreaker::new(5, 60_000);
        for _ in 0..4 {
            breaker.record_failure(0);
            assert_eq!(breaker.state(), BreakerState::Closed);
        }
        breaker.record_failure(0);
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn half_opens_after_duration_then_closes_on_success() {
        let breaker = CircuitBreaker::new(1, 1000);
        breaker.record_failure(0);
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.should_attempt(500));
        assert!(breaker.should_attempt(1001));
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_probe_failure_reopens() {
        let breaker = CircuitBreaker::new(1, 1000);
        breaker.record_failure(0);
        breaker.should_attempt(1001);
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        breaker.record_failure(1001);
        assert_eq!(breaker.state(), BreakerState::Open);
    }
}
