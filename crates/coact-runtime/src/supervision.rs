//! Links and exit propagation
//!
//! TigerStyle: Symmetric links, iterative propagation, explicit escalation.
//!
//! When an actor dies every linked peer hears about it. A peer trapping exits
//! receives `{exit, pid, reason}`; any other peer dies with the same reason
//! unless the reason is normal. Propagation runs from a worklist so long
//! link chains cannot exhaust the stack. An abnormal exit that reaches an
//! actor with no remaining links is reported to the failure sink.

use crate::scheduler::SchedulerCore;
use coact_core::config::FailurePolicy;
use coact_core::error::{Error, Result};
use coact_core::{atoms, ActorId, ExitReason, Value};
use std::collections::VecDeque;
use tracing::{debug, error};

/// Build the message a trapping actor receives when a linked peer dies
pub fn exit_message(from: ActorId, reason: &ExitReason) -> Value {
    Value::tuple([
        Value::atom(atoms::EXIT),
        Value::Pid(from),
        reason.to_value(),
    ])
}

/// Pending death in the propagation worklist
struct Death {
    id: ActorId,
    reason: ExitReason,
    /// Killed through a link rather than by its own body
    propagated: bool,
}

impl SchedulerCore {
    /// Link two live actors; self-links and existing links are no-ops
    pub(crate) fn link(&self, a: ActorId, b: ActorId) -> Result<()> {
        let first = self.live_cell(a)?;
        if a == b {
            return Ok(());
        }
        let second = self.live_cell(b)?;

        first.links.borrow_mut().insert(b);
        second.links.borrow_mut().insert(a);

        debug_assert!(first.links.borrow().contains(&b));
        debug_assert!(second.links.borrow().contains(&a));
        Ok(())
    }

    /// Remove the link in both directions; never fails
    pub(crate) fn unlink(&self, a: ActorId, b: ActorId) {
        if let Some(cell) = self.cell(a) {
            cell.links.borrow_mut().remove(&b);
        }
        if let Some(cell) = self.cell(b) {
            cell.links.borrow_mut().remove(&a);
        }
    }

    /// Retire an actor and propagate its exit over links
    pub(crate) fn exit_actor(&self, id: ActorId, reason: ExitReason) {
        let mut worklist = VecDeque::new();
        worklist.push_back(Death {
            id,
            reason,
            propagated: false,
        });

        while let Some(death) = worklist.pop_front() {
            debug_assert_ne!(death.id, self.root, "the root actor never dies");

            let removed = self.actors.borrow_mut().remove(&death.id);
            let Some(cell) = removed else {
                // Already retired earlier in this propagation
                continue;
            };

            cell.mark_dead(death.reason.clone());
            self.disarm_receive_timer(&cell);
            let body = cell.body.borrow_mut().take();
            let dropped = cell.mailbox.borrow_mut().clear();
            let names = self.registry.borrow_mut().remove_actor(death.id);
            self.stats
                .borrow_mut()
                .record_exit(death.reason.is_normal());

            debug!(
                actor = %death.id,
                reason = %death.reason,
                names = ?names,
                dropped_messages = dropped,
                propagated = death.propagated,
                "actor exited"
            );

            // A failure that reaches an actor with no further links, whether
            // its own or propagated, ends here and goes to the fallback sink
            let peers = std::mem::take(&mut *cell.links.borrow_mut());
            if peers.is_empty() && !death.reason.is_normal() {
                self.report_unlinked_failure(death.id, &death.reason);
            }

            for peer_id in peers {
                let Some(peer) = self.cell(peer_id) else {
                    continue;
                };
                peer.links.borrow_mut().remove(&death.id);

                if peer.trap_exit.get() {
                    self.send(peer_id, exit_message(death.id, &death.reason));
                } else if !death.reason.is_normal() {
                    if peer_id == self.root {
                        self.escalate(Error::ActorExited {
                            id: death.id,
                            reason: death.reason.to_value(),
                        });
                    } else {
                        worklist.push_back(Death {
                            id: peer_id,
                            reason: death.reason.clone(),
                            propagated: true,
                        });
                    }
                }
            }

            // Destructors of the body may touch the scheduler again
            drop(body);
        }
    }

    fn report_unlinked_failure(&self, id: ActorId, reason: &ExitReason) {
        error!(actor = %id, reason = %reason, "actor exited abnormally with no links");

        if let Some(sink) = self.failure_sink.borrow_mut().as_mut() {
            sink(id, reason);
        }
        if self.config.unlinked_failure == FailurePolicy::Escalate {
            self.escalate(Error::ActorExited {
                id,
                reason: reason.to_value(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use crate::scheduler::Scheduler;
    use coact_core::{Pattern, ValueKind};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_exit_message_shape() {
        let message = exit_message(ActorId::new(3), &ExitReason::error("boom"));
        assert_eq!(
            message,
            Value::tuple([
                Value::atom("exit"),
                Value::Pid(ActorId::new(3)),
                Value::from("boom")
            ])
        );
    }

    #[test]
    fn test_link_is_symmetric_and_idempotent() {
        let scheduler = Scheduler::new();
        let root = scheduler.root();
        let a = scheduler.spawn(|_ctx| async move { Ok(()) }).unwrap();

        root.link(a.id()).unwrap();
        root.link(a.id()).unwrap();
        root.link(root.id()).unwrap();

        assert_eq!(root.links(), vec![a.id()]);
        assert_eq!(a.links(), vec![root.id()]);

        root.unlink(a.id());
        root.unlink(a.id());
        assert!(root.links().is_empty());
        assert!(a.links().is_empty());
    }

    #[test]
    fn test_link_errors() {
        let scheduler = Scheduler::new();
        let root = scheduler.root();

        let err = root.link(ActorId::new(999)).unwrap_err();
        assert!(matches!(err, Error::ActorNotFound { .. }));

        let a = scheduler.spawn(|_ctx| async move { Ok(()) }).unwrap();
        scheduler.run().unwrap();
        let err = root.link(a.id()).unwrap_err();
        assert!(matches!(err, Error::DeadActor { id } if id == a.id()));
    }

    #[test]
    fn test_normal_exit_does_not_kill_linked_peer() {
        let scheduler = Scheduler::new();
        let waiter = scheduler
            .spawn(|ctx| async move {
                ctx.receive(Filter::new().when(Pattern::atom("go"), |_| ()))
                    .await
            })
            .unwrap();
        let waiter_id = waiter.id();
        scheduler
            .spawn(move |ctx| async move {
                ctx.link(waiter_id)?;
                Ok(())
            })
            .unwrap();

        scheduler.run().unwrap();
        assert!(waiter.is_alive());
        assert!(waiter.links().is_empty());
    }

    #[test]
    fn test_abnormal_exit_propagates_through_chain() {
        let scheduler = Scheduler::new();
        let mut chain: Vec<crate::actor::ActorRef> = Vec::new();
        for _ in 0..50 {
            let previous = chain.last().map(|actor| actor.id());
            chain.push(
                scheduler
                    .spawn(move |ctx| async move {
                        if let Some(previous) = previous {
                            ctx.link(previous)?;
                        }
                        ctx.receive(Filter::new().when(Pattern::atom("never"), |_| ()))
                            .await
                    })
                    .unwrap(),
            );
        }
        let tail = chain[49].id();
        scheduler
            .spawn(move |ctx| async move {
                ctx.link(tail)?;
                Err(Error::failed("crash"))
            })
            .unwrap();
        scheduler.run().unwrap();

        for actor in &chain {
            assert_eq!(actor.exit_reason(), Some(ExitReason::error("crash")));
            assert!(actor.links().is_empty());
        }
        assert_eq!(scheduler.actor_count(), 0);
        assert_eq!(scheduler.stats().actors_failed, 51);
    }

    #[test]
    fn test_trapping_peer_gets_exactly_one_exit_message() {
        let scheduler = Scheduler::new();
        let root = scheduler.root();
        root.set_trap_exit(true);

        let crasher = scheduler
            .spawn(|_ctx| async move { Err(Error::failed("boom")) })
            .unwrap();
        root.link(crasher.id()).unwrap();
        scheduler.run().unwrap();

        let message = scheduler
            .receive(Filter::new().when(Pattern::tuple([
                Pattern::atom("exit"),
                Pattern::kind(ValueKind::Pid),
                Pattern::Any,
            ]), |m| m))
            .unwrap();
        assert_eq!(message, exit_message(crasher.id(), &ExitReason::error("boom")));
        assert!(root.links().is_empty());
        assert_eq!(root.current().mailbox_len(), 0);
    }

    #[test]
    fn test_propagated_failure_reported_at_end_of_link() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let scheduler = Scheduler::builder()
            .with_failure_sink(move |id, reason| sink.borrow_mut().push((id, reason.clone())))
            .build()
            .unwrap();

        let waiter = scheduler
            .spawn(|ctx| async move {
                ctx.receive(Filter::new().when(Pattern::atom("never"), |_| ()))
                    .await
            })
            .unwrap();
        let waiter_id = waiter.id();
        let crasher = scheduler
            .spawn(move |ctx| async move {
                ctx.link(waiter_id)?;
                Err(Error::failed(Value::atom("boom")))
            })
            .unwrap();
        scheduler.run().unwrap();

        let boom = ExitReason::error(Value::atom("boom"));
        assert_eq!(waiter.exit_reason(), Some(boom.clone()));
        assert_eq!(crasher.exit_reason(), Some(boom.clone()));
        // The crasher still had a link when it died, so only the waiter reports
        assert_eq!(*seen.borrow(), vec![(waiter_id, boom)]);
    }

    #[test]
    fn test_linked_root_escalates_instead_of_dying() {
        let scheduler = Scheduler::new();
        let root = scheduler.root();
        let crasher = scheduler
            .spawn(|_ctx| async move { Err(Error::failed("boom")) })
            .unwrap();
        root.link(crasher.id()).unwrap();

        let err = scheduler.run().unwrap_err();
        assert!(matches!(err, Error::ActorExited { id, .. } if id == crasher.id()));
        assert!(root.current().is_alive());
    }
}
