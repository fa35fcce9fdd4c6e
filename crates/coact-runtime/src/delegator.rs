//! Request/reply on top of messages
//!
//! TigerStyle: A delegator is an ordinary actor serving one request at a time.
//!
//! Wire format, all plain [`Value`] tuples:
//!
//! ```text
//! client -> server   {call, client_pid, method_atom, [args...]}
//! server -> client   {call_reply, server_pid, result}
//!                    {call_error, server_pid, reason}
//! client -> server   stop
//! ```

use crate::actor::ActorRef;
use crate::context::Context;
use crate::filter::Filter;
use coact_core::error::{Error, Result};
use coact_core::{atoms, ActorId, Pattern, Value};
use std::time::Duration;
use tracing::{debug, trace};

/// Object served by a delegator actor
pub trait Delegate: 'static {
    /// Handle `method`; an `Err` is sent back to the caller as the failure reason
    fn call(&mut self, method: &str, args: Vec<Value>) -> std::result::Result<Value, Value>;

    /// Messages that are neither calls nor `stop`
    fn on_message(&mut self, message: Value) {
        trace!(message = %message, "delegate ignored message");
    }
}

/// Spawns delegate servers and calls into them
#[derive(Debug, Clone, Copy, Default)]
pub struct Delegator;

enum Reply {
    Value(Value),
    Failed(Value),
    TimedOut,
}

impl Delegator {
    /// Spawn an actor serving `delegate`
    pub fn spawn<D: Delegate>(ctx: &Context, delegate: D) -> Result<ActorRef> {
        ctx.spawn(move |server| serve(server, delegate))
    }

    /// Spawn a server linked to the calling actor
    pub fn spawn_link<D: Delegate>(ctx: &Context, delegate: D) -> Result<ActorRef> {
        ctx.spawn_link(move |server| serve(server, delegate))
    }

    /// Call `method` on `server` and wait for the reply
    pub async fn call(
        ctx: &Context,
        server: ActorId,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value> {
        Self::request(ctx, server, method, args, None).await
    }

    /// Like [`Delegator::call`], giving up after `timeout`
    pub async fn call_timeout(
        ctx: &Context,
        server: ActorId,
        method: &str,
        args: Vec<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        Self::request(ctx, server, method, args, Some(timeout)).await
    }

    /// Ask `server` to finish its loop and exit normally
    pub fn stop(ctx: &Context, server: ActorId) {
        ctx.send(server, Value::atom(atoms::STOP));
    }

    async fn request(
        ctx: &Context,
        server: ActorId,
        method: &str,
        args: Vec<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        if ctx.lookup(server).is_none() {
            return Err(Error::DeadActor { id: server });
        }

        ctx.send(
            server,
            Value::tuple([
                Value::atom(atoms::CALL),
                Value::Pid(ctx.id()),
                Value::atom(method),
                Value::List(args),
            ]),
        );

        let mut filter = Filter::new()
            .when(reply_from(atoms::CALL_REPLY, server), |m| {
                Reply::Value(payload(m))
            })
            .when(reply_from(atoms::CALL_ERROR, server), |m| {
                Reply::Failed(payload(m))
            });
        if let Some(timeout) = timeout {
            filter = filter.after(timeout, || Reply::TimedOut);
        }

        match ctx.receive(filter).await? {
            Reply::Value(value) => Ok(value),
            Reply::Failed(reason) => Err(Error::CallFailed {
                method: method.to_string(),
                reason,
            }),
            Reply::TimedOut => Err(Error::CallTimeout {
                method: method.to_string(),
                timeout_ms: timeout.map_or(0, |t| t.as_millis() as u64),
            }),
        }
    }
}

fn reply_from(tag: &str, server: ActorId) -> Pattern {
    Pattern::tuple([
        Pattern::atom(tag),
        Pattern::exact(Value::Pid(server)),
        Pattern::Any,
    ])
}

/// Last element of a reply tuple
fn payload(reply: Value) -> Value {
    reply
        .into_tuple()
        .and_then(|mut items| items.pop())
        .unwrap_or_default()
}

/// Split `{call, from, method, [args]}`
fn parse_call(message: &Value) -> Option<(ActorId, String, Vec<Value>)> {
    match message.as_tuple()? {
        [tag, Value::Pid(from), method, Value::List(args)] if tag.is_atom(atoms::CALL) => {
            Some((*from, method.as_atom()?.to_string(), args.clone()))
        }
        _ => None,
    }
}

async fn serve<D: Delegate>(ctx: Context, mut delegate: D) -> Result<()> {
    let me = Value::Pid(ctx.id());
    debug!(actor = %ctx.id(), "delegator started");

    loop {
        let message = ctx
            .receive(Filter::new().when(Pattern::Any, |m| m))
            .await?;

        if message.is_atom(atoms::STOP) {
            debug!(actor = %ctx.id(), "delegator stopped");
            return Ok(());
        }

        let Some((from, method, args)) = parse_call(&message) else {
            delegate.on_message(message);
            continue;
        };

        let reply = match delegate.call(&method, args) {
            Ok(result) => Value::tuple([Value::atom(atoms::CALL_REPLY), me.clone(), result]),
            Err(reason) => Value::tuple([Value::atom(atoms::CALL_ERROR), me.clone(), reason]),
        };
        ctx.send(from, reply);
    }
}
