//! Actor context
//!
//! TigerStyle: Every operation an actor performs goes through its context;
//! nothing reaches for ambient global state.

use crate::actor::{ActorCell, ActorRef};
use crate::filter::Filter;
use crate::receive::{Receive, YieldNow};
use crate::scheduler::SchedulerCore;
use coact_core::error::{Error, Result};
use coact_core::{ActorId, Value};
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

/// Handle an actor body uses to talk to its scheduler
///
/// Each actor gets its own context; [`Scheduler::root`](crate::Scheduler::root)
/// gives the context of the root pseudo-actor used by top-level code.
#[derive(Clone)]
pub struct Context {
    core: Rc<SchedulerCore>,
    cell: Rc<ActorCell>,
}

impl Context {
    pub(crate) fn new(core: Rc<SchedulerCore>, cell: Rc<ActorCell>) -> Self {
        Self { core, cell }
    }

    pub fn id(&self) -> ActorId {
        self.cell.id
    }

    /// Handle to the actor owning this context
    pub fn current(&self) -> ActorRef {
        ActorRef::new(self.cell.clone())
    }

    pub fn is_root(&self) -> bool {
        self.cell.id == self.core.root
    }

    // =========================================================================
    // Spawning and messaging
    // =========================================================================

    /// Spawn an actor; it first runs on the next scheduler pass
    pub fn spawn<F, Fut>(&self, body: F) -> Result<ActorRef>
    where
        F: FnOnce(Context) -> Fut + 'static,
        Fut: Future<Output = Result<()>> + 'static,
    {
        self.core.spawn(body, None)
    }

    /// Spawn an actor already linked to this one
    pub fn spawn_link<F, Fut>(&self, body: F) -> Result<ActorRef>
    where
        F: FnOnce(Context) -> Fut + 'static,
        Fut: Future<Output = Result<()>> + 'static,
    {
        self.core.spawn(body, Some(self.cell.id))
    }

    /// Send a message; silently dropped if `to` is dead
    pub fn send(&self, to: ActorId, message: impl Into<Value>) {
        self.core.send(to, message.into());
    }

    /// Send to a registered name
    pub fn send_named(&self, name: &str, message: impl Into<Value>) -> Result<()> {
        let to = self
            .whereis(name)
            .ok_or_else(|| Error::actor_not_found(name))?;
        self.core.send(to, message.into());
        Ok(())
    }

    /// Selective receive
    ///
    /// Takes the earliest queued message matched by any rule of `filter`,
    /// leaving every other message in place. Suspends until such a message
    /// arrives or the filter's timeout elapses.
    pub fn receive<'a, T>(&self, filter: Filter<'a, T>) -> Receive<'a, T> {
        Receive::new(self.core.clone(), self.cell.clone(), filter)
    }

    /// Let every other runnable actor go first
    pub fn yield_now(&self) -> YieldNow {
        YieldNow::new(self.core.clone(), self.cell.id)
    }

    /// Suspend for `duration` without consuming messages
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        self.receive(Filter::new().after(duration, || ())).await
    }

    // =========================================================================
    // Links
    // =========================================================================

    /// Link to `other`; linking twice or to self is a no-op
    pub fn link(&self, other: ActorId) -> Result<()> {
        self.core.link(self.cell.id, other)
    }

    /// Remove the link to `other` if there is one
    pub fn unlink(&self, other: ActorId) {
        self.core.unlink(self.cell.id, other);
    }

    pub fn links(&self) -> Vec<ActorId> {
        self.cell.links.borrow().iter().copied().collect()
    }

    /// Receive `{exit, pid, reason}` messages instead of dying with linked peers
    pub fn set_trap_exit(&self, trap: bool) {
        self.cell.trap_exit.set(trap);
    }

    pub fn trap_exit(&self) -> bool {
        self.cell.trap_exit.get()
    }

    // =========================================================================
    // Process dictionary
    // =========================================================================

    pub fn get(&self, key: impl Into<Value>) -> Option<Value> {
        self.cell.dictionary.borrow().get(&key.into()).cloned()
    }

    /// Store a value, returning the previous one
    pub fn put(&self, key: impl Into<Value>, value: impl Into<Value>) -> Option<Value> {
        self.cell
            .dictionary
            .borrow_mut()
            .insert(key.into(), value.into())
    }

    pub fn erase(&self, key: impl Into<Value>) -> Option<Value> {
        self.cell.dictionary.borrow_mut().remove(&key.into())
    }

    /// Keys of the dictionary, sorted
    pub fn dictionary_keys(&self) -> Vec<Value> {
        let mut keys: Vec<Value> = self.cell.dictionary.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }

    // =========================================================================
    // Registry and lookup
    // =========================================================================

    /// Register a live actor under `name`
    pub fn register(&self, name: &str, actor: ActorId) -> Result<()> {
        self.core.live_cell(actor)?;
        self.core.registry.borrow_mut().register(name, actor)?;
        tracing::debug!(actor = %actor, name, "actor registered");
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> Option<ActorId> {
        self.core.registry.borrow_mut().unregister(name)
    }

    pub fn whereis(&self, name: &str) -> Option<ActorId> {
        self.core.registry.borrow().whereis(name)
    }

    /// All registered names, sorted
    pub fn registered(&self) -> Vec<String> {
        self.core.registry.borrow().names()
    }

    /// Handle to a live actor
    pub fn lookup(&self, id: ActorId) -> Option<ActorRef> {
        self.core.cell(id).map(ActorRef::new)
    }

    /// Reactor time
    pub fn now(&self) -> Duration {
        self.core.now()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").field("id", &self.cell.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::filter::Filter;
    use crate::scheduler::Scheduler;
    use coact_core::error::Error;
    use coact_core::{ExitReason, Pattern, Value};

    #[test]
    fn test_dictionary_operations() {
        let scheduler = Scheduler::new();
        let keys = scheduler
            .block_on(|ctx| async move {
                assert_eq!(ctx.put("b", 2i64), None);
                assert_eq!(ctx.put("a", 1i64), None);
                assert_eq!(ctx.put("a", 3i64), Some(Value::Int(1)));
                assert_eq!(ctx.get("a"), Some(Value::Int(3)));
                assert_eq!(ctx.erase("b"), Some(Value::Int(2)));
                assert_eq!(ctx.get("b"), None);
                Ok(ctx.dictionary_keys())
            })
            .unwrap();
        assert_eq!(keys, vec![Value::from("a")]);
    }

    #[test]
    fn test_dictionaries_are_per_actor() {
        let scheduler = Scheduler::new();
        let result = scheduler
            .block_on(|ctx| async move {
                ctx.put("key", "main");
                let parent = ctx.id();
                let child = ctx.spawn(move |child| async move {
                    let inherited = child.get("key").unwrap_or_default();
                    child.put("key", "child");
                    let own = child.get("key").unwrap_or_default();
                    child.send(parent, Value::tuple([inherited, own]));
                    Ok(())
                })?;
                let seen = ctx
                    .receive(Filter::new().when(Pattern::Any, |m| m))
                    .await?;
                ctx.yield_now().await;
                assert_eq!(child.exit_reason(), Some(ExitReason::Normal));
                Ok((seen, ctx.get("key")))
            })
            .unwrap();
        assert_eq!(
            result,
            (
                Value::tuple([Value::Nil, Value::from("child")]),
                Some(Value::from("main"))
            )
        );
    }

    #[test]
    fn test_register_and_send_named() {
        let scheduler = Scheduler::new();
        let reply = scheduler
            .block_on(|ctx| async move {
                let me = ctx.id();
                let echo = ctx.spawn(move |echo| async move {
                    let message = echo
                        .receive(Filter::new().when(Pattern::Any, |m| m))
                        .await?;
                    echo.send(me, message);
                    Ok(())
                })?;
                ctx.register("echo", echo.id())?;
                ctx.register("mirror", echo.id())?;
                assert_eq!(ctx.whereis("echo"), Some(echo.id()));
                assert_eq!(ctx.whereis("mirror"), Some(echo.id()));
                assert_eq!(echo.names(), vec!["echo".to_string(), "mirror".to_string()]);

                ctx.send_named("echo", "hi")?;
                let reply = ctx
                    .receive(Filter::new().when(Pattern::Any, |m| m))
                    .await?;

                ctx.yield_now().await;
                assert_eq!(ctx.whereis("echo"), None);
                assert_eq!(ctx.whereis("mirror"), None);
                Ok(reply)
            })
            .unwrap();
        assert_eq!(reply, Value::from("hi"));
    }

    #[test]
    fn test_send_named_unknown() {
        let scheduler = Scheduler::new();
        let err = scheduler.root().send_named("nobody", "hi").unwrap_err();
        assert!(matches!(err, Error::ActorNotFound { .. }));
    }

    #[test]
    fn test_register_dead_actor() {
        let scheduler = Scheduler::new();
        let actor = scheduler.spawn(|_ctx| async move { Ok(()) }).unwrap();
        scheduler.run().unwrap();

        let err = scheduler.root().register("gone", actor.id()).unwrap_err();
        assert!(matches!(err, Error::DeadActor { .. }));
    }

    #[test]
    fn test_spawn_link_kills_parent_on_crash() {
        let scheduler = Scheduler::new();
        let parent = scheduler
            .spawn(|ctx| async move {
                ctx.spawn_link(|_child| async move { Err(Error::failed("child crashed")) })?;
                ctx.receive(Filter::new().when(Pattern::atom("never"), |_| ()))
                    .await
            })
            .unwrap();
        scheduler.run().unwrap();

        assert_eq!(
            parent.exit_reason().map(|r| r.to_value()),
            Some(Value::from("child crashed"))
        );
    }
}
