//! Deterministic clock for simulation
//!
//! TigerStyle: Explicit time control, no system time dependencies.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Deterministic simulation clock
///
/// Virtual time measured from the start of the simulation. It only moves when
/// told to, usually by the simulated event loop jumping to the next deadline.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    /// Nanoseconds since the simulation started
    current_time_ns: Arc<AtomicU64>,
}

impl SimClock {
    /// Create a clock at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock starting at `ms` milliseconds
    pub fn from_millis(ms: u64) -> Self {
        Self {
            current_time_ns: Arc::new(AtomicU64::new(ms.saturating_mul(1_000_000))),
        }
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        Duration::from_nanos(self.current_time_ns.load(Ordering::SeqCst))
    }

    /// Current virtual time in milliseconds
    pub fn now_ms(&self) -> u64 {
        self.current_time_ns.load(Ordering::SeqCst) / 1_000_000
    }

    /// Advance time by `duration`
    pub fn advance(&self, duration: Duration) {
        let delta_ns = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.current_time_ns.fetch_add(delta_ns, Ordering::SeqCst);
    }

    /// Advance time by the given number of milliseconds
    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Move forward to `deadline`; never moves backwards
    pub fn advance_to(&self, deadline: Duration) {
        let target_ns = u64::try_from(deadline.as_nanos()).unwrap_or(u64::MAX);
        self.current_time_ns.fetch_max(target_ns, Ordering::SeqCst);
    }

    /// Check if a deadline (in ms) has passed
    pub fn is_past_ms(&self, deadline_ms: u64) -> bool {
        self.now_ms() >= deadline_ms
    }
}
