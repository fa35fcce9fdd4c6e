//! Simulated event loop
//!
//! TigerStyle: Virtual time jumps straight to the next deadline; nothing
//! waits on the wall clock.

use crate::clock::SimClock;
use coact_core::{ActorId, Reactor, ReactorEvent, TimerCallback, TimerId, TimerQueue, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;
use tracing::{trace, warn};

/// Which simulation bound stopped the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimLimit {
    Steps,
    Time,
}

struct SimState {
    timers: TimerQueue,
    /// Messages injected from the test, keyed by (deadline, sequence)
    deliveries: BTreeMap<(Duration, u64), (ActorId, Value)>,
    next_delivery: u64,
    steps: u64,
    max_steps: u64,
    max_time: Duration,
    exhausted: Option<SimLimit>,
}

/// Deterministic [`Reactor`] over a [`SimClock`]
///
/// Clones share state: hand one to the scheduler and keep another to inject
/// messages and inspect the run.
#[derive(Clone)]
pub struct SimEventLoop {
    clock: SimClock,
    state: Rc<RefCell<SimState>>,
}

impl SimEventLoop {
    pub fn new(clock: SimClock, max_steps: u64, max_time_ms: u64) -> Self {
        debug_assert!(max_steps > 0, "max_steps must be positive");

        Self {
            clock,
            state: Rc::new(RefCell::new(SimState {
                timers: TimerQueue::new(),
                deliveries: BTreeMap::new(),
                next_delivery: 0,
                steps: 0,
                max_steps,
                max_time: Duration::from_millis(max_time_ms),
                exhausted: None,
            })),
        }
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Deliver `message` to `to` on the next reactor iteration
    pub fn inject(&self, to: ActorId, message: impl Into<Value>) {
        self.inject_after(Duration::ZERO, to, message);
    }

    /// Deliver `message` to `to` once `delay` of virtual time has passed
    pub fn inject_after(&self, delay: Duration, to: ActorId, message: impl Into<Value>) {
        let deadline = self.clock.now() + delay;
        let mut state = self.state.borrow_mut();
        let sequence = state.next_delivery;
        state.next_delivery += 1;
        state
            .deliveries
            .insert((deadline, sequence), (to, message.into()));
    }

    /// Reactor iterations so far
    pub fn steps(&self) -> u64 {
        self.state.borrow().steps
    }

    pub fn pending_timers(&self) -> usize {
        self.state.borrow().timers.len()
    }

    /// The bound that stopped the run, if one did
    pub fn exhausted(&self) -> Option<SimLimit> {
        self.state.borrow().exhausted
    }
}

impl SimState {
    fn next_deadline(&self) -> Option<Duration> {
        let delivery = self.deliveries.keys().next().map(|(deadline, _)| *deadline);
        match (self.timers.next_deadline(), delivery) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

impl Reactor for SimEventLoop {
    fn now(&self) -> Duration {
        self.clock.now()
    }

    fn add_timer(&mut self, delay: Duration, callback: TimerCallback) -> TimerId {
        let deadline = self.clock.now() + delay;
        self.state.borrow_mut().timers.insert(deadline, callback)
    }

    fn cancel_timer(&mut self, id: TimerId) -> bool {
        self.state.borrow_mut().timers.cancel(id)
    }

    fn has_active_watchers(&self) -> bool {
        let state = self.state.borrow();
        !state.timers.is_empty() || !state.deliveries.is_empty()
    }

    fn run_once(&mut self, max_wait: Option<Duration>) -> Vec<ReactorEvent> {
        let mut state = self.state.borrow_mut();

        state.steps += 1;
        if state.steps > state.max_steps {
            warn!(steps = state.steps, "simulation step limit reached");
            state.exhausted = Some(SimLimit::Steps);
            return vec![ReactorEvent::Shutdown];
        }

        let now = self.clock.now();
        let Some(deadline) = state.next_deadline() else {
            // Waiting forever on nothing: the run can never make progress
            return match max_wait {
                Some(_) => Vec::new(),
                None => vec![ReactorEvent::Shutdown],
            };
        };

        if deadline > now {
            if let Some(wait) = max_wait {
                if deadline > now + wait {
                    self.clock.advance_to(now + wait);
                    return Vec::new();
                }
            }
            if deadline > state.max_time {
                warn!(
                    deadline_ms = deadline.as_millis() as u64,
                    "simulation time limit reached"
                );
                state.exhausted = Some(SimLimit::Time);
                return vec![ReactorEvent::Shutdown];
            }
            self.clock.advance_to(deadline);
            trace!(now_ms = self.clock.now_ms(), "virtual time advanced");
        }

        let now = self.clock.now();
        let mut events = Vec::new();
        while let Some(entry) = state.deliveries.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let (to, message) = entry.remove();
            events.push(ReactorEvent::Deliver { to, message });
        }
        events.extend(
            state
                .timers
                .pop_expired(now)
                .into_iter()
                .map(ReactorEvent::Timer),
        );
        events
    }
}

impl std::fmt::Debug for SimEventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SimEventLoop")
            .field("now", &self.clock.now())
            .field("timers", &state.timers.len())
            .field("deliveries", &state.deliveries.len())
            .field("steps", &state.steps)
            .finish()
    }
}
