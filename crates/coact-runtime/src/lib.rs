//! Coact Runtime
//!
//! Single-threaded cooperative actor scheduler.
//!
//! # Overview
//!
//! Actors are `async` bodies driven by a [`Scheduler`]. They share nothing;
//! they communicate by sending [`Value`](coact_core::Value) messages and pick
//! messages out of their mailbox with selective receive. Linked actors die
//! together unless one of them traps exits.
//!
//! ```rust,ignore
//! use coact_core::{Pattern, Value};
//! use coact_runtime::{Filter, Scheduler};
//!
//! let scheduler = Scheduler::new();
//! let answer = scheduler.block_on(|ctx| async move {
//!     let me = ctx.id();
//!     ctx.spawn(move |child| async move {
//!         child.send(me, Value::tuple([Value::atom("answer"), Value::Int(42)]));
//!         Ok(())
//!     })?;
//!     ctx.receive(Filter::new().when(
//!         Pattern::tuple([Pattern::atom("answer"), Pattern::Any]),
//!         |m| m,
//!     ))
//!     .await
//! })?;
//! ```
//!
//! # Scheduling
//!
//! - Actors only give up control at `receive`, `sleep`, and `yield_now`
//! - Each pass resumes a snapshot of the run queue, each actor at most once
//! - Between passes the [`Reactor`](coact_core::Reactor) fires timers and
//!   delivers messages injected from other threads

mod actor;
mod context;
mod delegator;
mod event_loop;
mod filter;
mod mailbox;
mod receive;
mod registry;
mod scheduler;
mod stats;
mod supervision;

pub use actor::{ActorRef, ActorStatus};
pub use context::Context;
pub use delegator::{Delegate, Delegator};
pub use event_loop::{EventLoop, RemoteHandle};
pub use filter::{Filter, Handler, TimeoutHandler};
pub use mailbox::Mailbox;
pub use receive::{Receive, YieldNow};
pub use scheduler::{FailureSink, Scheduler, SchedulerBuilder};
pub use stats::SchedulerStats;
pub use supervision::exit_message;
