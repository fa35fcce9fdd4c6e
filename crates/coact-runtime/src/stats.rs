//! Scheduler statistics
//!
//! TigerStyle: Plain counters, wrapping arithmetic, copied out on read.

/// Counters describing what a scheduler has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub actors_spawned: u64,
    pub actors_exited: u64,
    /// Exits with a reason other than normal
    pub actors_failed: u64,
    pub messages_delivered: u64,
    /// Messages sent to dead or unknown actors
    pub dead_letters: u64,
    pub resumes: u64,
    /// Snapshot passes over the run queue
    pub passes: u64,
    pub reactor_polls: u64,
    pub timers_fired: u64,
    pub panics_caught: u64,
}

impl SchedulerStats {
    /// Actors spawned and not yet exited
    pub fn actors_live(&self) -> u64 {
        self.actors_spawned.saturating_sub(self.actors_exited)
    }

    pub(crate) fn record_spawn(&mut self) {
        self.actors_spawned = self.actors_spawned.wrapping_add(1);
    }

    pub(crate) fn record_exit(&mut self, normal: bool) {
        self.actors_exited = self.actors_exited.wrapping_add(1);
        if !normal {
            self.actors_failed = self.actors_failed.wrapping_add(1);
        }
    }

    pub(crate) fn record_delivery(&mut self) {
        self.messages_delivered = self.messages_delivered.wrapping_add(1);
    }

    pub(crate) fn record_dead_letter(&mut self) {
        self.dead_letters = self.dead_letters.wrapping_add(1);
    }

    pub(crate) fn record_resume(&mut self) {
        self.resumes = self.resumes.wrapping_add(1);
    }

    pub(crate) fn record_pass(&mut self) {
        self.passes = self.passes.wrapping_add(1);
    }

    pub(crate) fn record_reactor_poll(&mut self) {
        self.reactor_polls = self.reactor_polls.wrapping_add(1);
    }

    pub(crate) fn record_timer_fired(&mut self) {
        self.timers_fired = self.timers_fired.wrapping_add(1);
    }

    pub(crate) fn record_panic(&mut self) {
        self.panics_caught = self.panics_caught.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_live_count() {
        let mut stats = SchedulerStats::default();
        stats.record_spawn();
        stats.record_spawn();
        stats.record_exit(true);
        stats.record_exit(false);
        stats.record_spawn();

        assert_eq!(stats.actors_live(), 1);
        assert_eq!(stats.actors_failed, 1);
    }
}
