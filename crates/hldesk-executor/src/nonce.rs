//! Millisecond-timestamp nonces for signed exchange actions.
//!
//! The exchange requires nonces to be close to wall-clock time and to
//! never repeat. `next()` returns `max(last + 1, now_ms)` so a burst of
//! submissions within one millisecond still gets distinct values and a
//! clock regression never produces a smaller nonce.

use std::sync::atomic::{AtomicU64, Ordering};

/// Time source, swappable in tests.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// Wall-clock implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
            Ok(d) => d.as_millis() as u64,
            Err(_) => 0,
        }
    }
}

/// Thread-safe monotonic nonce generator.
pub struct NonceManager<C: Clock> {
    last: AtomicU64,
    clock: C,
}

impl<C: Clock> NonceManager<C> {
    pub fn new(clock: C) -> Self {
        let now = clock.now_ms();
        Self {
            last: AtomicU64::new(now),
            clock,
        }
    }

    /// Next nonce, strictly greater than every previously issued one.
    pub fn next(&self) -> u64 {
        let now = self.clock.now_ms();
        loop {
            let prev = self.last.load(Ordering::Acquire);
            let candidate = prev.saturating_add(1).max(now);
            match self.last.compare_exchange_weak(
                prev,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return candidate,
                Err(_) => continue,
            }
        }
    }
}

impl NonceManager<SystemClock> {
    pub fn with_system_clock() -> Self {
        Self::new(SystemClock)
    }
}
