//! Wall-clock event loop
//!
//! TigerStyle: Timers in a deadline-ordered queue, cross-thread input through
//! a bounded-per-poll channel drain.
//!
//! The event loop is the default [`Reactor`]. Besides timers it owns a
//! crossbeam channel; [`RemoteHandle`]s are the only way other threads can
//! reach actors, and every message they send is delivered on the scheduler
//! thread.

use coact_core::constants::REACTOR_EVENTS_PER_POLL_COUNT_MAX;
use coact_core::error::{Error, Result};
use coact_core::{ActorId, Reactor, ReactorEvent, TimerCallback, TimerId, TimerQueue, Value};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Input arriving from other threads
#[derive(Debug)]
enum Injection {
    Deliver { to: ActorId, message: Value },
    Shutdown,
    /// Re-evaluate watchers; sent when the last remote handle goes away
    Wake,
}

/// Reactor backed by the monotonic clock
pub struct EventLoop {
    epoch: Instant,
    timers: TimerQueue,
    tx: Sender<Injection>,
    rx: Receiver<Injection>,
    remotes: Arc<AtomicUsize>,
}

impl EventLoop {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            epoch: Instant::now(),
            timers: TimerQueue::new(),
            tx,
            rx,
            remotes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handle other threads can use to inject messages
    ///
    /// While any handle is alive the loop counts as having an active watcher,
    /// so a scheduler running until idle keeps waiting for injected input.
    pub fn remote_handle(&self) -> RemoteHandle {
        self.remotes.fetch_add(1, Ordering::SeqCst);
        RemoteHandle {
            tx: self.tx.clone(),
            remotes: self.remotes.clone(),
        }
    }

    fn wait(&self, max_wait: Option<Duration>) -> Option<Injection> {
        let timer_wait = self
            .timers
            .next_deadline()
            .map(|deadline| deadline.saturating_sub(self.now()));
        let wait = match (max_wait, timer_wait) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        match wait {
            Some(wait) if wait.is_zero() => match self.rx.try_recv() {
                Ok(injection) => Some(injection),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
            },
            Some(wait) => match self.rx.recv_timeout(wait) {
                Ok(injection) => Some(injection),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
            },
            // The loop holds a sender itself, so this cannot disconnect
            None => self.rx.recv().ok(),
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Reactor for EventLoop {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn add_timer(&mut self, delay: Duration, callback: TimerCallback) -> TimerId {
        let deadline = self.now() + delay;
        self.timers.insert(deadline, callback)
    }

    fn cancel_timer(&mut self, id: TimerId) -> bool {
        self.timers.cancel(id)
    }

    fn has_active_watchers(&self) -> bool {
        !self.timers.is_empty() || self.remotes.load(Ordering::SeqCst) > 0 || !self.rx.is_empty()
    }

    fn run_once(&mut self, max_wait: Option<Duration>) -> Vec<ReactorEvent> {
        let mut events = Vec::new();

        let first = self.wait(max_wait);
        let drained = first
            .into_iter()
            .chain(std::iter::from_fn(|| self.rx.try_recv().ok()))
            .take(REACTOR_EVENTS_PER_POLL_COUNT_MAX);
        for injection in drained {
            match injection {
                Injection::Deliver { to, message } => {
                    trace!(to = %to, "remote message received");
                    events.push(ReactorEvent::Deliver { to, message });
                }
                Injection::Shutdown => {
                    debug!("remote shutdown received");
                    events.push(ReactorEvent::Shutdown);
                }
                Injection::Wake => {}
            }
        }

        let now = self.now();
        events.extend(
            self.timers
                .pop_expired(now)
                .into_iter()
                .map(ReactorEvent::Timer),
        );
        events
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("timers", &self.timers.len())
            .field("remotes", &self.remotes.load(Ordering::SeqCst))
            .finish()
    }
}

/// Thread-safe handle for delivering messages into a scheduler
///
/// Cloning a handle registers another watcher; dropping the last one lets a
/// scheduler running until idle stop.
pub struct RemoteHandle {
    tx: Sender<Injection>,
    remotes: Arc<AtomicUsize>,
}

impl RemoteHandle {
    /// Queue `message` for delivery to `to` on the scheduler thread
    pub fn send(&self, to: ActorId, message: impl Into<Value>) -> Result<()> {
        self.tx
            .send(Injection::Deliver {
                to,
                message: message.into(),
            })
            .map_err(|_| Error::Shutdown)
    }

    /// Ask the scheduler to return from its current run
    pub fn shutdown(&self) -> Result<()> {
        self.tx.send(Injection::Shutdown).map_err(|_| Error::Shutdown)
    }
}

impl Clone for RemoteHandle {
    fn clone(&self) -> Self {
        self.remotes.fetch_add(1, Ordering::SeqCst);
        Self {
            tx: self.tx.clone(),
            remotes: self.remotes.clone(),
        }
    }
}

impl Drop for RemoteHandle {
    fn drop(&mut self) {
        if self.remotes.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.tx.send(Injection::Wake);
        }
    }
}

impl std::fmt::Debug for RemoteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteHandle").finish()
    }
}
