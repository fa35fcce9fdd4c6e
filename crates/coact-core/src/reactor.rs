//! Reactor abstraction
//!
//! TigerStyle: The scheduler never touches I/O or clocks directly; it asks a
//! reactor for one iteration and dispatches what comes back.
//!
//! Production code uses the wall-clock event loop from `coact-runtime`;
//! deterministic tests use the virtual-time loop from `coact-dst`.

use crate::value::{ActorId, Value};
use std::time::Duration;

/// Callback run when a timer fires
pub type TimerCallback = Box<dyn FnOnce()>;

/// Handle to a registered timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl TimerId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Something that happened during one reactor iteration
///
/// Events are returned to the scheduler instead of being invoked in place, so
/// callbacks never run while the reactor itself is borrowed.
pub enum ReactorEvent {
    /// A timer expired
    Timer(TimerCallback),
    /// A message arrived from outside the scheduler thread
    Deliver { to: ActorId, message: Value },
    /// The reactor was asked to stop the scheduler
    Shutdown,
}

impl std::fmt::Debug for ReactorEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timer(_) => f.write_str("Timer"),
            Self::Deliver { to, message } => f
                .debug_struct("Deliver")
                .field("to", to)
                .field("message", message)
                .finish(),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Event source driven by the scheduler
pub trait Reactor {
    /// Time elapsed since the reactor was created
    fn now(&self) -> Duration;

    /// Register a one-shot timer firing `delay` from now
    fn add_timer(&mut self, delay: Duration, callback: TimerCallback) -> TimerId;

    /// Detach a timer; returns false if it already fired
    fn cancel_timer(&mut self, id: TimerId) -> bool;

    /// Whether any watcher could still produce an event
    fn has_active_watchers(&self) -> bool;

    /// Run one iteration
    ///
    /// Blocks for at most `max_wait` (forever when `None`) until at least one
    /// event is ready, then returns every ready event.
    fn run_once(&mut self, max_wait: Option<Duration>) -> Vec<ReactorEvent>;
}

impl<R: Reactor + ?Sized> Reactor for Box<R> {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn add_timer(&mut self, delay: Duration, callback: TimerCallback) -> TimerId {
        (**self).add_timer(delay, callback)
    }

    fn cancel_timer(&mut self, id: TimerId) -> bool {
        (**self).cancel_timer(id)
    }

    fn has_active_watchers(&self) -> bool {
        (**self).has_active_watchers()
    }

    fn run_once(&mut self, max_wait: Option<Duration>) -> Vec<ReactorEvent> {
        (**self).run_once(max_wait)
    }
}
