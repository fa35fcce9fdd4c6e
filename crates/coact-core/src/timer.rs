//! Deadline-ordered timer storage shared by reactor implementations
//!
//! TigerStyle: Timers fire in deadline order, ties in registration order.

use crate::reactor::{TimerCallback, TimerId};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Pending timers keyed by absolute deadline
///
/// Deadlines are offsets from the owning reactor's epoch, so the same queue
/// serves wall-clock and simulated time.
#[derive(Default)]
pub struct TimerQueue {
    next_id: u64,
    entries: BTreeMap<(Duration, u64), TimerCallback>,
    deadlines: HashMap<u64, Duration>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` to fire at `deadline`
    pub fn insert(&mut self, deadline: Duration, callback: TimerCallback) -> TimerId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        self.entries.insert((deadline, id), callback);
        self.deadlines.insert(id, deadline);

        debug_assert_eq!(self.entries.len(), self.deadlines.len());
        TimerId::new(id)
    }

    /// Remove a timer before it fires
    ///
    /// Returns false if the timer already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let Some(deadline) = self.deadlines.remove(&id.as_u64()) else {
            return false;
        };
        let removed = self.entries.remove(&(deadline, id.as_u64())).is_some();

        debug_assert!(removed, "timer index out of sync");
        removed
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Duration> {
        self.entries.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove and return every timer whose deadline is at or before `now`
    pub fn pop_expired(&mut self, now: Duration) -> Vec<TimerCallback> {
        let mut expired = Vec::new();

        while let Some(entry) = self.entries.first_entry() {
            let (deadline, id) = *entry.key();
            if deadline > now {
                break;
            }
            expired.push(entry.remove());
            self.deadlines.remove(&id);
        }

        expired
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerQueue")
            .field("pending", &self.entries.len())
            .field("next_deadline", &self.next_deadline())
            .finish()
    }
}
