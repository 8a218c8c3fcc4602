//! Leverage auto-provisioning bookkeeping.
//!
//! Before the first order on a (dex, coin) pair each session, the router
//! pushes the symbol's max leverage to the venue. This state gates that:
//! once per pair per session, never with two identical requests in
//! flight, and never more often than the throttle interval.
//!
//! A pair is marked applied on failure too, so a persistently failing
//! leverage API is tried once and then stops consuming requests. Flagged
//! for review in DESIGN.md; preserved as-is.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

const CHECK_THROTTLE: Duration = Duration::from_secs(60);

#[derive(Default)]
struct Inner {
    applied: HashSet<String>,
    in_flight: HashSet<String>,
    last_checked: HashMap<String, Instant>,
}

/// Session-scoped leverage application state for one venue.
#[derive(Default)]
pub struct LeverageApplicationState {
    inner: Mutex<Inner>,
}

impl LeverageApplicationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an update should be issued for `key` now. On `true` the
    /// key is marked in-flight; the caller must follow up with
    /// `mark_applied` whatever the outcome.
    pub fn begin_if_needed(&self, key: &str) -> bool {
        let mut inner = self.inner.lock();
        if inner.applied.contains(key) || inner.in_flight.contains(key) {
            return false;
        }
        if let Some(checked) = inner.last_checked.get(key) {
            if checked.elapsed() < CHECK_THROTTLE {
                return false;
            }
        }
        inner.in_flight.insert(key.to_string());
        true
    }

    /// Record the attempt as done, success or not.
    pub fn mark_applied(&self, key: &str) {
        let mut inner = self.inner.lock();
        inner.in_flight.remove(key);
        inner.applied.insert(key.to_string());
        inner.last_checked.insert(key.to_string(), Instant::now());
    }

    pub fn is_applied(&self, key: &str) -> bool {
        self.inner.lock().applied.contains(key)
    }
}
