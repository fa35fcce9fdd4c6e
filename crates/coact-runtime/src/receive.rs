//! Suspension points
//!
//! TigerStyle: An actor gives up control only at a receive or an explicit
//! yield. Both are futures polled by the scheduler with a no-op waker;
//! readiness is signalled by putting the actor back on the run queue.

use crate::actor::ActorCell;
use crate::filter::Filter;
use crate::mailbox::{Mailbox, Selection};
use crate::scheduler::SchedulerCore;
use coact_core::error::{Error, Result};
use coact_core::ActorId;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context as TaskContext, Poll};
use tracing::trace;

/// Future returned by [`Context::receive`](crate::Context::receive)
///
/// Resolves with the result of the handler of the first rule matching the
/// earliest queued message, or of the timeout handler.
#[must_use = "receive does nothing unless awaited"]
pub struct Receive<'a, T> {
    core: Rc<SchedulerCore>,
    cell: Rc<ActorCell>,
    filter: Option<Filter<'a, T>>,
    validated: bool,
}

impl<'a, T> Receive<'a, T> {
    pub(crate) fn new(core: Rc<SchedulerCore>, cell: Rc<ActorCell>, filter: Filter<'a, T>) -> Self {
        Self {
            core,
            cell,
            filter: Some(filter),
            validated: false,
        }
    }

    fn finish(&mut self, outcome: Selection) -> Result<T> {
        self.core.disarm_receive_timer(&self.cell);
        let filter = self
            .filter
            .take()
            .ok_or_else(|| Error::internal("receive completed twice"))?;

        match outcome {
            Selection::Matched { message, rule } => filter.dispatch(rule, message),
            Selection::TimedOut => filter.dispatch_timeout(),
            Selection::NoMatch => Err(Error::internal("receive finished without a selection")),
        }
    }
}

impl<'a, T> Future for Receive<'a, T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        let selection = {
            let Some(filter) = this.filter.as_ref() else {
                return Poll::Ready(Err(Error::internal("receive polled after completion")));
            };

            if !this.validated {
                if let Err(err) = filter.validate(this.core.config.receive_timeout_ms_max) {
                    this.filter = None;
                    return Poll::Ready(Err(err));
                }
                this.validated = true;
            }

            if this.core.current_actor() != Some(this.cell.id) {
                this.filter = None;
                return Poll::Ready(Err(Error::not_in_actor_context("receive")));
            }

            let selection = Mailbox::select_from(&this.cell.mailbox, filter);
            if let (Selection::NoMatch, Some(timeout)) = (&selection, filter.timeout()) {
                if this.cell.mailbox.borrow().pending_timer().is_none() {
                    this.core.arm_receive_timer(&this.cell, timeout);
                }
            }
            selection
        };

        match selection {
            Selection::NoMatch => {
                trace!(
                    actor = %this.cell.id,
                    queued = this.cell.mailbox.borrow().len(),
                    "receive suspended"
                );
                Poll::Pending
            }
            outcome => Poll::Ready(this.finish(outcome)),
        }
    }
}

impl<'a, T> Drop for Receive<'a, T> {
    fn drop(&mut self) {
        // Abandoned while waiting: the timer must not wake the actor later
        if self.filter.is_some() && self.validated {
            self.core.disarm_receive_timer(&self.cell);
        }
    }
}

/// Future returned by [`Context::yield_now`](crate::Context::yield_now)
#[must_use = "yield_now does nothing unless awaited"]
pub struct YieldNow {
    core: Rc<SchedulerCore>,
    id: ActorId,
    yielded: bool,
}

impl YieldNow {
    pub(crate) fn new(core: Rc<SchedulerCore>, id: ActorId) -> Self {
        Self {
            core,
            id,
            yielded: false,
        }
    }
}

impl Future for YieldNow {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.yielded || this.core.current_actor() != Some(this.id) {
            return Poll::Ready(());
        }
        this.yielded = true;
        this.core.enqueue(this.id);
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use crate::filter::Filter;
    use crate::scheduler::Scheduler;
    use coact_core::error::Error;
    use coact_core::{Pattern, Value};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    #[test]
    fn test_receive_in_arrival_order() {
        let scheduler = Scheduler::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();

        let receiver = scheduler
            .spawn(move |ctx| async move {
                for _ in 0..3 {
                    let message = ctx
                        .receive(Filter::new().when(Pattern::Any, |m| m))
                        .await?;
                    log.borrow_mut().push(message);
                }
                Ok(())
            })
            .unwrap();

        for n in 1..=3i64 {
            scheduler.send(receiver.id(), n);
        }
        scheduler.run().unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
    }

    #[test]
    fn test_yield_lets_others_run() {
        let scheduler = Scheduler::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for name in ["a", "b"] {
            let order = order.clone();
            scheduler
                .spawn(move |ctx| async move {
                    order.borrow_mut().push(format!("{}1", name));
                    ctx.yield_now().await;
                    order.borrow_mut().push(format!("{}2", name));
                    Ok(())
                })
                .unwrap();
        }
        scheduler.run().unwrap();

        assert_eq!(*order.borrow(), vec!["a1", "b1", "a2", "b2"]);
    }

    #[test]
    fn test_timeout_already_specified() {
        let scheduler = Scheduler::new();
        let result = scheduler.block_on(|ctx| async move {
            ctx.receive(
                Filter::new()
                    .after(Duration::ZERO, || 1)
                    .after(Duration::ZERO, || 2),
            )
            .await
        });
        assert!(matches!(result, Err(Error::TimeoutAlreadySpecified)));
    }

    #[test]
    fn test_sleep_then_timeout_handler() {
        let scheduler = Scheduler::new();
        let result = scheduler
            .block_on(|ctx| async move {
                ctx.sleep(Duration::from_millis(5)).await?;
                ctx.receive(
                    Filter::new()
                        .when(Pattern::atom("never"), |_| "message")
                        .after(Duration::from_millis(5), || "timeout"),
                )
                .await
            })
            .unwrap();
        assert_eq!(result, "timeout");
        assert!(scheduler.stats().timers_fired >= 2);
    }
}
