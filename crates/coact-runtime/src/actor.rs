//! Actor cells and handles
//!
//! TigerStyle: Explicit lifecycle states, single owner for mutable state.

use crate::mailbox::Mailbox;
use crate::scheduler::SchedulerCore;
use coact_core::error::Result;
use coact_core::{ActorId, ExitReason, Value};
use futures::future::LocalBoxFuture;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

/// Lifecycle state of an actor
///
/// ```text
/// Spawned ──first resume──▶ Running ──body ends / linked death──▶ Dead
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorStatus {
    /// Queued, body not started yet
    Spawned,
    /// Started at least once
    Running,
    /// Never resumed again
    Dead,
}

pub(crate) type ActorBody = LocalBoxFuture<'static, Result<()>>;

/// State of one actor, shared between the scheduler and its handles
pub(crate) struct ActorCell {
    pub(crate) id: ActorId,
    pub(crate) mailbox: RefCell<Mailbox>,
    pub(crate) dictionary: RefCell<HashMap<Value, Value>>,
    pub(crate) links: RefCell<BTreeSet<ActorId>>,
    pub(crate) trap_exit: Cell<bool>,
    status: Cell<ActorStatus>,
    exit_reason: RefCell<Option<ExitReason>>,
    /// Suspended body; taken out while the actor is being polled
    pub(crate) body: RefCell<Option<ActorBody>>,
    scheduler: Weak<SchedulerCore>,
}

impl ActorCell {
    pub(crate) fn new(id: ActorId, scheduler: Weak<SchedulerCore>) -> Self {
        Self {
            id,
            mailbox: RefCell::new(Mailbox::new()),
            dictionary: RefCell::new(HashMap::new()),
            links: RefCell::new(BTreeSet::new()),
            trap_exit: Cell::new(false),
            status: Cell::new(ActorStatus::Spawned),
            exit_reason: RefCell::new(None),
            body: RefCell::new(None),
            scheduler,
        }
    }

    pub(crate) fn status(&self) -> ActorStatus {
        self.status.get()
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.status.get() != ActorStatus::Dead
    }

    pub(crate) fn mark_running(&self) {
        debug_assert!(self.is_alive(), "dead actors are never resumed");
        self.status.set(ActorStatus::Running);
    }

    pub(crate) fn mark_dead(&self, reason: ExitReason) {
        debug_assert!(self.is_alive(), "actor {} died twice", self.id);
        self.status.set(ActorStatus::Dead);
        *self.exit_reason.borrow_mut() = Some(reason);
    }

    pub(crate) fn exit_reason(&self) -> Option<ExitReason> {
        self.exit_reason.borrow().clone()
    }

    pub(crate) fn scheduler(&self) -> Option<Rc<SchedulerCore>> {
        self.scheduler.upgrade()
    }
}

/// Handle to an actor
///
/// Handles compare and hash by actor id and stay valid after the actor dies;
/// sending to a dead actor is a silent no-op.
#[derive(Clone)]
pub struct ActorRef {
    pub(crate) cell: Rc<ActorCell>,
}

impl ActorRef {
    pub(crate) fn new(cell: Rc<ActorCell>) -> Self {
        Self { cell }
    }

    pub fn id(&self) -> ActorId {
        self.cell.id
    }

    pub fn is_alive(&self) -> bool {
        self.cell.is_alive()
    }

    pub fn status(&self) -> ActorStatus {
        self.cell.status()
    }

    /// Why the actor died, or `None` while it is alive
    pub fn exit_reason(&self) -> Option<ExitReason> {
        self.cell.exit_reason()
    }

    /// Send a message; dropped silently if the actor is dead
    pub fn send(&self, message: impl Into<Value>) {
        match self.cell.scheduler() {
            Some(core) => core.send(self.cell.id, message.into()),
            None => tracing::trace!(to = %self.cell.id, "scheduler gone; message dropped"),
        }
    }

    pub fn mailbox_len(&self) -> usize {
        self.cell.mailbox.borrow().len()
    }

    /// Copy of the queued messages, oldest first
    pub fn queued_messages(&self) -> Vec<Value> {
        self.cell.mailbox.borrow().messages().cloned().collect()
    }

    pub fn trap_exit(&self) -> bool {
        self.cell.trap_exit.get()
    }

    /// Current link set
    pub fn links(&self) -> Vec<ActorId> {
        self.cell.links.borrow().iter().copied().collect()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.cell
            .scheduler()
            .map(|core| core.registry.borrow().names_of(self.cell.id))
            .unwrap_or_default()
    }
}

impl PartialEq for ActorRef {
    fn eq(&self, other: &Self) -> bool {
        self.cell.id == other.cell.id
    }
}

impl Eq for ActorRef {}

impl Hash for ActorRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cell.id.hash(state);
    }
}

impl fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("id", &self.cell.id)
            .field("status", &self.cell.status())
            .finish()
    }
}

impl fmt::Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cell.id)
    }
}

impl From<&ActorRef> for Value {
    fn from(actor: &ActorRef) -> Self {
        Value::Pid(actor.id())
    }
}

impl From<ActorRef> for Value {
    fn from(actor: ActorRef) -> Self {
        Value::Pid(actor.id())
    }
}
