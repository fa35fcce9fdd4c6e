//! DST tests for delegator servers and out-of-band delivery
//!
//! TigerStyle: Deterministic testing of request/reply over plain messages.

use coact_core::error::Error;
use coact_core::{Pattern, Value};
use coact_dst::{SimConfig, Simulation};
use coact_runtime::{Delegate, Delegator, EventLoop, Filter, RemoteHandle, Scheduler};
use std::collections::BTreeMap;
use std::time::Duration;

/// Key/value store served by a delegator
#[derive(Default)]
struct Store {
    entries: BTreeMap<String, Value>,
}

impl Delegate for Store {
    fn call(&mut self, method: &str, args: Vec<Value>) -> Result<Value, Value> {
        let key = args
            .first()
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Value::atom("badarg"))?;

        match method {
            "put" => {
                let value = args.get(1).cloned().unwrap_or_default();
                Ok(self.entries.insert(key, value).unwrap_or_default())
            }
            "get" => self
                .entries
                .get(&key)
                .cloned()
                .ok_or_else(|| Value::atom("not_found")),
            _ => Err(Value::atom("undef")),
        }
    }
}

#[test]
fn test_dst_delegator_serves_clients_in_order() {
    let config = SimConfig::from_env_or_random();

    let result = Simulation::new(config).run(|env| {
        let rng = env.fork_rng();
        let writes: Vec<(String, i64)> = (0..25)
            .map(|i| (format!("k{}", rng.next_index(5)), i))
            .collect();

        let mut expected = BTreeMap::new();
        for (key, value) in &writes {
            expected.insert(key.clone(), Value::Int(*value));
        }

        let observed = env.scheduler.block_on(move |ctx| async move {
            let store = Delegator::spawn_link(&ctx, Store::default())?;
            for (key, value) in writes {
                Delegator::call(
                    &ctx,
                    store.id(),
                    "put",
                    vec![Value::from(key), Value::Int(value)],
                )
                .await?;
            }

            let mut observed = BTreeMap::new();
            for n in 0..5 {
                let key = format!("k{}", n);
                match Delegator::call(&ctx, store.id(), "get", vec![Value::from(key.clone())]).await
                {
                    Ok(value) => {
                        observed.insert(key, value);
                    }
                    Err(Error::CallFailed { reason, .. }) => {
                        assert_eq!(reason, Value::atom("not_found"));
                    }
                    Err(other) => return Err(other),
                }
            }
            Delegator::stop(&ctx, store.id());
            Ok(observed)
        })?;

        assert_eq!(observed, expected);
        Ok(())
    });

    assert!(result.is_ok(), "Test failed: {:?}", result.err());
}

/// Never answers calls
struct Mute;

impl Delegate for Mute {
    fn call(&mut self, _method: &str, _args: Vec<Value>) -> Result<Value, Value> {
        Err(Value::atom("unreachable"))
    }
}

#[test]
fn test_dst_call_timeout_in_virtual_time() {
    let config = SimConfig::from_env_or_random();

    let result = Simulation::new(config).run(|env| {
        let outcome = env.scheduler.block_on(|ctx| async move {
            // A plain actor stands in for a server that never replies
            let silent = ctx.spawn(|ctx| async move {
                ctx.receive(Filter::new().when(Pattern::atom("never"), |_| ()))
                    .await
            })?;
            Ok(Delegator::call_timeout(
                &ctx,
                silent.id(),
                "ping",
                vec![],
                Duration::from_secs(5),
            )
            .await)
        })?;

        match outcome {
            Err(Error::CallTimeout { method, timeout_ms }) => {
                assert_eq!(method, "ping");
                assert_eq!(timeout_ms, 5_000);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(env.now_ms(), 5_000);
        Ok(())
    });

    assert!(result.is_ok(), "Test failed: {:?}", result.err());
}

#[test]
fn test_dst_delegator_replies_to_the_right_caller() {
    let config = SimConfig::from_env_or_random();

    let result = Simulation::new(config).run(|env| {
        let root = env.scheduler.root();
        let server = Delegator::spawn(&root, Mute)?;
        let server_id = server.id();

        for _ in 0..3 {
            let driver = root.id();
            env.scheduler.spawn(move |ctx| async move {
                let reply = Delegator::call(&ctx, server_id, "anything", vec![]).await;
                let failed = matches!(reply, Err(Error::CallFailed { .. }));
                ctx.send(driver, Value::tuple([Value::atom("client"), Value::Bool(failed)]));
                Ok(())
            })?;
        }

        for _ in 0..3 {
            let failed = env.scheduler.receive(Filter::new().when(
                Pattern::tuple([Pattern::atom("client"), Pattern::Any]),
                |m| m.into_tuple().and_then(|mut items| items.pop()),
            ))?;
            assert_eq!(failed, Some(Value::Bool(true)));
        }
        assert!(server.is_alive());
        Ok(())
    });

    assert!(result.is_ok(), "Test failed: {:?}", result.err());
}

// =============================================================================
// Wall-clock event loop with remote delivery
// =============================================================================

#[test]
fn test_remote_handle_drives_scheduler_from_another_thread() {
    let event_loop = EventLoop::new();
    let remote: RemoteHandle = event_loop.remote_handle();
    let scheduler = Scheduler::builder().with_reactor(event_loop).build().unwrap();

    let total = scheduler
        .block_on(move |ctx| async move {
            let me = ctx.id();
            let feeder = std::thread::spawn(move || {
                for n in 1..=10i64 {
                    remote.send(me, n).unwrap();
                }
                remote.send(me, Value::atom("done")).unwrap();
            });

            let mut total = 0;
            loop {
                let next = ctx
                    .receive(
                        Filter::new()
                            .when(Pattern::atom("done"), |_| None)
                            .when(Pattern::Any, |m| m.as_int()),
                    )
                    .await?;
                match next {
                    Some(n) => total += n,
                    None => break,
                }
            }
            feeder
                .join()
                .map_err(|_| Error::internal("feeder thread panicked"))?;
            Ok(total)
        })
        .unwrap();

    assert_eq!(total, 55);
}
