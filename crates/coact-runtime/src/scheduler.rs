//! Cooperative scheduler
//!
//! TigerStyle: One thread, one run queue, explicit pass boundaries.
//!
//! A pass takes a snapshot of the run queue and resumes each actor in it
//! exactly once. Actors made runnable during a pass land in the next
//! snapshot. After every pass the reactor gets one iteration if it has
//! watchers; when nothing is runnable and no watcher remains the scheduler
//! goes idle.

use crate::actor::{ActorBody, ActorCell, ActorRef};
use crate::context::Context;
use crate::event_loop::EventLoop;
use crate::filter::Filter;
use crate::mailbox::{Mailbox, Selection};
use crate::registry::Registry;
use crate::stats::SchedulerStats;
use coact_core::config::{RunMode, SchedulerConfig};
use coact_core::error::{Error, Result};
use coact_core::{atoms, ActorId, ExitReason, Reactor, ReactorEvent, Value};
use futures::future::FutureExt;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;
use tracing::{debug, info, instrument, trace, warn};

/// Callback told about actors that exited abnormally with no links
pub type FailureSink = Box<dyn FnMut(ActorId, &ExitReason)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchedulerState {
    Idle,
    Running,
}

/// Result of one pass plus reactor iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Work may remain
    Busy,
    /// The caller's completion condition holds
    Done,
    /// Nothing runnable and no watchers
    Idle,
    /// The reactor asked the scheduler to stop
    Shutdown,
}

/// Run queue with consecutive-duplicate suppression
#[derive(Debug, Default)]
struct RunQueue {
    entries: Vec<ActorId>,
}

impl RunQueue {
    /// Append unless `id` is already last
    fn push(&mut self, id: ActorId) -> bool {
        if self.entries.last() == Some(&id) {
            return false;
        }
        self.entries.push(id);
        true
    }

    fn take(&mut self) -> Vec<ActorId> {
        std::mem::take(&mut self.entries)
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resets the scheduler state when a run ends, including by unwinding
struct RunGuard<'a> {
    state: &'a Cell<SchedulerState>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.state.set(SchedulerState::Idle);
    }
}

/// Shared scheduler state
///
/// Owned by [`Scheduler`]; actor contexts hold strong references, actor
/// cells and timer callbacks hold weak ones.
pub(crate) struct SchedulerCore {
    pub(crate) config: SchedulerConfig,
    self_ref: Weak<SchedulerCore>,
    pub(crate) actors: RefCell<HashMap<ActorId, Rc<ActorCell>>>,
    run_queue: RefCell<RunQueue>,
    reactor: RefCell<Box<dyn Reactor>>,
    pub(crate) registry: RefCell<Registry>,
    current: Cell<Option<ActorId>>,
    next_id: Cell<u64>,
    state: Cell<SchedulerState>,
    pub(crate) stats: RefCell<SchedulerStats>,
    pub(crate) failure_sink: RefCell<Option<FailureSink>>,
    escalation: RefCell<Option<Error>>,
    pub(crate) root: ActorId,
}

impl SchedulerCore {
    fn new(
        config: SchedulerConfig,
        reactor: Box<dyn Reactor>,
        failure_sink: Option<FailureSink>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak: &Weak<SchedulerCore>| {
            let root = ActorId::new(0);
            let root_cell = Rc::new(ActorCell::new(root, weak.clone()));
            root_cell.mark_running();

            let mut actors = HashMap::new();
            actors.insert(root, root_cell);

            Self {
                config,
                self_ref: weak.clone(),
                actors: RefCell::new(actors),
                run_queue: RefCell::new(RunQueue::default()),
                reactor: RefCell::new(reactor),
                registry: RefCell::new(Registry::new()),
                current: Cell::new(None),
                next_id: Cell::new(1),
                state: Cell::new(SchedulerState::Idle),
                stats: RefCell::new(SchedulerStats::default()),
                failure_sink: RefCell::new(failure_sink),
                escalation: RefCell::new(None),
                root,
            }
        })
    }

    fn strong(&self) -> Result<Rc<SchedulerCore>> {
        self.self_ref
            .upgrade()
            .ok_or_else(|| Error::internal("scheduler dropped"))
    }

    fn enter(&self) -> Result<RunGuard<'_>> {
        if self.state.get() == SchedulerState::Running {
            return Err(Error::SchedulerReentered);
        }
        self.state.set(SchedulerState::Running);
        Ok(RunGuard { state: &self.state })
    }

    pub(crate) fn current_actor(&self) -> Option<ActorId> {
        self.current.get()
    }

    pub(crate) fn now(&self) -> Duration {
        self.reactor.borrow().now()
    }

    pub(crate) fn cell(&self, id: ActorId) -> Option<Rc<ActorCell>> {
        self.actors.borrow().get(&id).cloned()
    }

    /// Look up a live actor, distinguishing dead from never-spawned ids
    pub(crate) fn live_cell(&self, id: ActorId) -> Result<Rc<ActorCell>> {
        match self.cell(id) {
            Some(cell) => Ok(cell),
            None if self.was_spawned(id) => Err(Error::DeadActor { id }),
            None => Err(Error::actor_not_found(id)),
        }
    }

    fn was_spawned(&self, id: ActorId) -> bool {
        id.as_u64() < self.next_id.get()
    }

    fn root_cell(&self) -> Result<Rc<ActorCell>> {
        self.cell(self.root)
            .ok_or_else(|| Error::internal("root actor missing"))
    }

    pub(crate) fn enqueue(&self, id: ActorId) {
        debug_assert_ne!(id, self.root, "the root actor has no body to resume");
        self.run_queue.borrow_mut().push(id);
    }

    pub(crate) fn spawn<F, Fut>(&self, body: F, link_to: Option<ActorId>) -> Result<ActorRef>
    where
        F: FnOnce(Context) -> Fut + 'static,
        Fut: Future<Output = Result<()>> + 'static,
    {
        let live = self.actors.borrow().len().saturating_sub(1);
        if live >= self.config.actor_count_max {
            return Err(Error::ActorLimitReached {
                count: live,
                limit: self.config.actor_count_max,
            });
        }
        if let Some(parent) = link_to {
            self.live_cell(parent)?;
        }

        let id = ActorId::new(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);

        let cell = Rc::new(ActorCell::new(id, self.self_ref.clone()));
        let ctx = Context::new(self.strong()?, cell.clone());
        // The body does not run until the first resume
        let task: ActorBody = async move { body(ctx).await }.boxed_local();
        *cell.body.borrow_mut() = Some(task);

        self.actors.borrow_mut().insert(id, cell.clone());
        if let Some(parent) = link_to {
            self.link(parent, id)?;
        }
        self.stats.borrow_mut().record_spawn();
        self.enqueue(id);

        debug!(actor = %id, linked_to = ?link_to, "actor spawned");
        Ok(ActorRef::new(cell))
    }

    /// Append to a live actor's mailbox and make it runnable
    pub(crate) fn send(&self, to: ActorId, message: Value) {
        let Some(cell) = self.cell(to) else {
            self.stats.borrow_mut().record_dead_letter();
            if self.was_spawned(to) {
                trace!(to = %to, message = %message, "dead letter dropped");
            } else {
                warn!(to = %to, message = %message, "message to unknown actor dropped");
            }
            return;
        };

        cell.mailbox.borrow_mut().push(message);
        self.stats.borrow_mut().record_delivery();
        if to != self.root {
            self.enqueue(to);
        }
    }

    // =========================================================================
    // Receive timers
    // =========================================================================

    pub(crate) fn arm_receive_timer(&self, cell: &ActorCell, timeout: Duration) {
        let generation = cell.mailbox.borrow_mut().next_timer_generation();
        let core = self.self_ref.clone();
        let id = cell.id;

        let timer = self.reactor.borrow_mut().add_timer(
            timeout,
            Box::new(move || {
                if let Some(core) = core.upgrade() {
                    core.receive_timer_fired(id, generation);
                }
            }),
        );
        cell.mailbox.borrow_mut().arm_timer(timer, generation);

        trace!(actor = %id, timeout_ms = timeout.as_millis() as u64, "receive timer armed");
    }

    /// Release the receive timer of `cell`, cancelling it if still pending
    pub(crate) fn disarm_receive_timer(&self, cell: &ActorCell) {
        let Some(timer) = cell.mailbox.borrow_mut().release_timer() else {
            return;
        };
        // A timer that cannot be cancelled here fires later with a stale
        // generation and is ignored.
        if let Ok(mut reactor) = self.reactor.try_borrow_mut() {
            reactor.cancel_timer(timer);
        }
    }

    fn receive_timer_fired(&self, id: ActorId, generation: u64) {
        let Some(cell) = self.cell(id) else {
            return;
        };
        if cell.mailbox.borrow_mut().fire_timer(generation) {
            trace!(actor = %id, "receive timed out");
            if id != self.root {
                self.enqueue(id);
            }
        }
    }

    // =========================================================================
    // Run loop
    // =========================================================================

    /// Resume one actor up to its next suspension point
    fn resume(&self, id: ActorId) {
        let Some(cell) = self.cell(id) else {
            return;
        };
        let Some(mut body) = cell.body.borrow_mut().take() else {
            return;
        };

        cell.mark_running();
        self.stats.borrow_mut().record_resume();

        // Readiness is tracked through the run queue, so the waker is unused
        let waker = futures::task::noop_waker();
        let mut task_cx = TaskContext::from_waker(&waker);

        let previous = self.current.replace(Some(id));
        let polled = if self.config.catch_panics {
            panic::catch_unwind(AssertUnwindSafe(|| body.as_mut().poll(&mut task_cx)))
        } else {
            Ok(body.as_mut().poll(&mut task_cx))
        };
        self.current.set(previous);

        let reason = match polled {
            Ok(Poll::Pending) => {
                if cell.is_alive() {
                    *cell.body.borrow_mut() = Some(body);
                }
                return;
            }
            Ok(Poll::Ready(Ok(()))) => ExitReason::Normal,
            Ok(Poll::Ready(Err(err))) => {
                debug!(actor = %id, error = %err, "actor body returned an error");
                ExitReason::Error(err.exit_value())
            }
            Err(payload) => {
                self.stats.borrow_mut().record_panic();
                let message = panic_message(payload.as_ref());
                warn!(actor = %id, panic = %message, "actor panicked");
                ExitReason::Error(Value::tuple([
                    Value::atom(atoms::PANIC),
                    Value::from(message),
                ]))
            }
        };

        drop(body);
        self.exit_actor(id, reason);
    }

    /// Record an error for the current run to return
    pub(crate) fn escalate(&self, err: Error) {
        let mut slot = self.escalation.borrow_mut();
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    /// One snapshot pass, then at most one reactor iteration
    fn step(&self, done: &dyn Fn() -> bool, idle_stop: bool) -> Result<Step> {
        let batch = self.run_queue.borrow_mut().take();
        for id in batch {
            self.resume(id);
        }
        self.stats.borrow_mut().record_pass();

        let escalated = self.escalation.borrow_mut().take();
        if let Some(err) = escalated {
            return Err(err);
        }
        if done() {
            return Ok(Step::Done);
        }

        let runnable = !self.run_queue.borrow().is_empty();
        let watchers = self.reactor.borrow().has_active_watchers();
        if !watchers {
            if runnable {
                return Ok(Step::Busy);
            }
            if idle_stop {
                return Ok(Step::Idle);
            }
        }

        let max_wait = if runnable { Some(Duration::ZERO) } else { None };
        let events = self.reactor.borrow_mut().run_once(max_wait);
        self.stats.borrow_mut().record_reactor_poll();

        let mut shutdown = false;
        for event in events {
            match event {
                ReactorEvent::Timer(callback) => {
                    self.stats.borrow_mut().record_timer_fired();
                    callback();
                }
                ReactorEvent::Deliver { to, message } => self.send(to, message),
                ReactorEvent::Shutdown => shutdown = true,
            }
        }

        if shutdown {
            return Ok(Step::Shutdown);
        }
        Ok(Step::Busy)
    }

    /// Drop every suspended body so contexts release the core
    fn teardown(&self) {
        let cells: Vec<Rc<ActorCell>> = self.actors.borrow_mut().drain().map(|(_, c)| c).collect();
        let bodies: Vec<ActorBody> = cells
            .iter()
            .filter_map(|cell| cell.body.borrow_mut().take())
            .collect();

        self.run_queue.borrow_mut().take();
        self.registry.borrow_mut().clear();
        drop(bodies);
        self.failure_sink.borrow_mut().take();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Builder for creating a scheduler
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    reactor: Option<Box<dyn Reactor>>,
    failure_sink: Option<FailureSink>,
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
            reactor: None,
            failure_sink: None,
        }
    }

    /// Set the configuration
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the reactor (default: a wall-clock [`EventLoop`])
    pub fn with_reactor(mut self, reactor: impl Reactor + 'static) -> Self {
        self.reactor = Some(Box::new(reactor));
        self
    }

    /// Observe abnormal exits of actors that have no links
    pub fn with_failure_sink(mut self, sink: impl FnMut(ActorId, &ExitReason) + 'static) -> Self {
        self.failure_sink = Some(Box::new(sink));
        self
    }

    /// Build the scheduler
    pub fn build(self) -> Result<Scheduler> {
        self.config.validate()?;

        let reactor = self
            .reactor
            .unwrap_or_else(|| Box::new(EventLoop::new()));

        info!(
            run_mode = ?self.config.run_mode,
            unlinked_failure = ?self.config.unlinked_failure,
            "Creating Coact scheduler"
        );

        Ok(Scheduler {
            core: SchedulerCore::new(self.config, reactor, self.failure_sink),
        })
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The actor scheduler
///
/// Owns every actor, the run queue, the name registry, and the reactor.
/// Top-level code acts as the root pseudo-actor: it can send, spawn, link,
/// and receive through [`Scheduler::receive`].
pub struct Scheduler {
    core: Rc<SchedulerCore>,
}

impl Scheduler {
    /// Create a scheduler with default configuration and a wall-clock event loop
    pub fn new() -> Self {
        let config = SchedulerConfig::default();
        Self {
            core: SchedulerCore::new(config, Box::new(EventLoop::new()), None),
        }
    }

    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.core.config
    }

    /// Context of the root pseudo-actor
    pub fn root(&self) -> Context {
        let cell = self
            .core
            .cell(self.core.root)
            .unwrap_or_else(|| Rc::new(ActorCell::new(self.core.root, Weak::new())));
        Context::new(self.core.clone(), cell)
    }

    /// The actor being resumed, or the root pseudo-actor outside of a resume
    pub fn current(&self) -> ActorRef {
        let id = self.core.current_actor().unwrap_or(self.core.root);
        match self.core.cell(id) {
            Some(cell) => ActorRef::new(cell),
            None => self.root().current(),
        }
    }

    /// Spawn an actor; its body starts on the next pass
    pub fn spawn<F, Fut>(&self, body: F) -> Result<ActorRef>
    where
        F: FnOnce(Context) -> Fut + 'static,
        Fut: Future<Output = Result<()>> + 'static,
    {
        self.core.spawn(body, None)
    }

    /// Send a message from top-level code
    pub fn send(&self, to: ActorId, message: impl Into<Value>) {
        self.core.send(to, message.into());
    }

    /// Look up a live actor
    pub fn lookup(&self, id: ActorId) -> Option<ActorRef> {
        self.core.cell(id).map(ActorRef::new)
    }

    pub fn is_alive(&self, id: ActorId) -> bool {
        self.core.cell(id).is_some()
    }

    pub fn whereis(&self, name: &str) -> Option<ActorRef> {
        let id = self.core.registry.borrow().whereis(name)?;
        self.lookup(id)
    }

    /// All registered names, sorted
    pub fn registered(&self) -> Vec<String> {
        self.core.registry.borrow().names()
    }

    /// Live actors, not counting the root
    pub fn actor_count(&self) -> usize {
        self.core.actors.borrow().len().saturating_sub(1)
    }

    pub fn stats(&self) -> SchedulerStats {
        *self.core.stats.borrow()
    }

    /// Reactor time
    pub fn now(&self) -> Duration {
        self.core.now()
    }

    /// Run until idle (or until shutdown in `RunMode::Forever`)
    #[instrument(skip(self), level = "debug")]
    pub fn run(&self) -> Result<()> {
        let _guard = self.core.enter()?;
        let idle_stop = self.core.config.run_mode == RunMode::UntilIdle;

        loop {
            match self.core.step(&|| false, idle_stop)? {
                Step::Busy | Step::Done => continue,
                Step::Idle => {
                    debug!(stats = ?self.stats(), "scheduler idle");
                    return Ok(());
                }
                Step::Shutdown => {
                    info!("scheduler shutdown requested");
                    return Ok(());
                }
            }
        }
    }

    /// Spawn `body` as an actor and run until it finishes
    ///
    /// Returns the body's result. Fails with [`Error::ActorExited`] if the
    /// actor was killed through a link, and with [`Error::Deadlock`] if it is
    /// still waiting when nothing else can run.
    #[instrument(skip_all, level = "debug")]
    pub fn block_on<F, Fut, T>(&self, body: F) -> Result<T>
    where
        F: FnOnce(Context) -> Fut + 'static,
        Fut: Future<Output = Result<T>> + 'static,
        T: 'static,
    {
        let _guard = self.core.enter()?;

        let slot: Rc<RefCell<Option<Result<T>>>> = Rc::new(RefCell::new(None));
        let output = slot.clone();
        let main = self.core.spawn(
            move |ctx| async move {
                let result = body(ctx).await;
                *output.borrow_mut() = Some(result);
                Ok(())
            },
            None,
        )?;

        let finished = || slot.borrow().is_some() || !main.is_alive();
        let mut shutdown = false;
        while !finished() {
            match self.core.step(&finished, true)? {
                Step::Busy => continue,
                Step::Done | Step::Idle => break,
                Step::Shutdown => {
                    shutdown = true;
                    break;
                }
            }
        }

        let result = slot.borrow_mut().take();
        if let Some(result) = result {
            return result;
        }
        if let Some(reason) = main.exit_reason() {
            return Err(Error::ActorExited {
                id: main.id(),
                reason: reason.to_value(),
            });
        }
        if shutdown {
            return Err(Error::Shutdown);
        }
        Err(Error::Deadlock { id: main.id() })
    }

    /// Selective receive on the root mailbox, running actors while waiting
    pub fn receive<'a, T>(&self, filter: Filter<'a, T>) -> Result<T> {
        filter.validate(self.core.config.receive_timeout_ms_max)?;
        let _guard = self.core.enter()?;
        let root = self.core.root_cell()?;

        let result = self.receive_root(&root, filter);
        self.core.disarm_receive_timer(&root);
        result
    }

    fn receive_root<'a, T>(&self, root: &ActorCell, filter: Filter<'a, T>) -> Result<T> {
        loop {
            match Mailbox::select_from(&root.mailbox, &filter) {
                Selection::Matched { message, rule } => return filter.dispatch(rule, message),
                Selection::TimedOut => return filter.dispatch_timeout(),
                Selection::NoMatch => {}
            }

            if let Some(timeout) = filter.timeout() {
                if root.mailbox.borrow().pending_timer().is_none() {
                    self.core.arm_receive_timer(root, timeout);
                }
            }

            let seen = root.mailbox.borrow().enqueued_count();
            let changed = || {
                let mailbox = root.mailbox.borrow();
                mailbox.enqueued_count() != seen || mailbox.timed_out()
            };
            match self.core.step(&changed, true)? {
                Step::Busy | Step::Done => continue,
                Step::Idle => return Err(Error::Deadlock { id: root.id }),
                Step::Shutdown => return Err(Error::Shutdown),
            }
        }
    }

    /// Non-blocking selective receive on the root mailbox
    ///
    /// Returns `None` when nothing matches. A filter with a timeout treats it
    /// as already elapsed and returns the timeout handler's result instead.
    pub fn try_receive<'a, T>(&self, filter: Filter<'a, T>) -> Result<Option<T>> {
        filter.validate(self.core.config.receive_timeout_ms_max)?;
        let root = self.core.root_cell()?;

        match Mailbox::select_from(&root.mailbox, &filter) {
            Selection::Matched { message, rule } => filter.dispatch(rule, message).map(Some),
            Selection::TimedOut => filter.dispatch_timeout().map(Some),
            Selection::NoMatch if filter.timeout().is_some() => {
                filter.dispatch_timeout().map(Some)
            }
            Selection::NoMatch => Ok(None),
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.core.teardown();
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("actors", &self.actor_count())
            .field("config", &self.core.config)
            .finish()
    }
}
