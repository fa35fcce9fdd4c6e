//! Simulation harness for deterministic testing
//!
//! TigerStyle: Reproducible test execution with explicit configuration.
//!
//! A simulation wires a [`Scheduler`] to a [`SimEventLoop`], so receive
//! timeouts and injected messages play out in virtual time. Same seed, same
//! run: actor order is fixed by the run queue, and every random choice a test
//! makes comes from the seeded [`DeterministicRng`].

use crate::clock::SimClock;
use crate::reactor::{SimEventLoop, SimLimit};
use crate::rng::DeterministicRng;
use coact_core::{ActorId, ExitReason, SchedulerConfig, DST_STEPS_COUNT_MAX, DST_TIME_MS_MAX};
use coact_runtime::Scheduler;
use std::cell::RefCell;
use std::rc::Rc;

/// Configuration for a simulation
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Maximum reactor iterations
    pub max_steps: u64,
    /// Maximum simulated time in milliseconds
    pub max_time_ms: u64,
}

impl SimConfig {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            max_steps: DST_STEPS_COUNT_MAX,
            max_time_ms: DST_TIME_MS_MAX,
        }
    }

    /// Create config from DST_SEED environment variable or random
    pub fn from_env_or_random() -> Self {
        let seed = std::env::var("DST_SEED")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(rand::random);

        tracing::info!(seed = seed, "DST seed (set DST_SEED={} to replay)", seed);

        Self::new(seed)
    }

    pub fn with_max_steps(mut self, steps: u64) -> Self {
        self.max_steps = steps;
        self
    }

    pub fn with_max_time_ms(mut self, ms: u64) -> Self {
        self.max_time_ms = ms;
        self
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Environment provided to simulation tests
pub struct SimEnvironment {
    pub clock: SimClock,
    pub rng: DeterministicRng,
    /// Shared with the scheduler; use it to inject messages
    pub event_loop: SimEventLoop,
    pub scheduler: Scheduler,
    failures: Rc<RefCell<Vec<(ActorId, ExitReason)>>>,
}

impl SimEnvironment {
    /// Fork the RNG to create an independent stream
    pub fn fork_rng(&self) -> DeterministicRng {
        self.rng.fork()
    }

    /// Get current simulation time in milliseconds
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Abnormal exits of actors that had no links, in order
    pub fn unlinked_failures(&self) -> Vec<(ActorId, ExitReason)> {
        self.failures.borrow().clone()
    }
}

/// Main simulation harness
pub struct Simulation {
    config: SimConfig,
    scheduler_config: SchedulerConfig,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            scheduler_config: SchedulerConfig::default(),
        }
    }

    /// Use a non-default scheduler configuration
    pub fn with_scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.scheduler_config = config;
        self
    }

    /// Run the simulation with the given test function
    ///
    /// Fails if the test fails or if the run hit the step or time bound.
    pub fn run<F, T>(self, test: F) -> Result<T, SimulationError>
    where
        F: FnOnce(&SimEnvironment) -> coact_core::Result<T>,
    {
        let seed = self.config.seed;
        let clock = SimClock::new();
        let rng = DeterministicRng::new(seed);
        let event_loop =
            SimEventLoop::new(clock.clone(), self.config.max_steps, self.config.max_time_ms);

        let failures = Rc::new(RefCell::new(Vec::new()));
        let sink = failures.clone();
        let scheduler = Scheduler::builder()
            .with_config(self.scheduler_config)
            .with_reactor(event_loop.clone())
            .with_failure_sink(move |id, reason| sink.borrow_mut().push((id, reason.clone())))
            .build()
            .map_err(|e| SimulationError::RuntimeError(e.to_string()))?;

        let env = SimEnvironment {
            clock,
            rng,
            event_loop,
            scheduler,
            failures,
        };

        let result = test(&env);

        let outcome = match (env.event_loop.exhausted(), result) {
            (Some(SimLimit::Steps), _) => Err(SimulationError::MaxStepsExceeded),
            (Some(SimLimit::Time), _) => Err(SimulationError::MaxTimeExceeded),
            (None, Ok(value)) => Ok(value),
            (None, Err(err)) => Err(SimulationError::TestFailed(err)),
        };

        if let Err(err) = &outcome {
            tracing::error!(
                seed = seed,
                now_ms = env.now_ms(),
                error = %err,
                "simulation failed (set DST_SEED={} to replay)",
                seed
            );
        }
        outcome
    }
}

/// Why a simulation run failed
#[derive(Debug)]
pub enum SimulationError {
    /// Test function returned an error
    TestFailed(coact_core::Error),
    /// Simulation exceeded maximum steps
    MaxStepsExceeded,
    /// Simulation exceeded maximum time
    MaxTimeExceeded,
    /// Scheduler construction failed
    RuntimeError(String),
}

impl std::fmt::Display for SimulationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulationError::TestFailed(e) => write!(f, "Test failed: {}", e),
            SimulationError::MaxStepsExceeded => write!(f, "Simulation exceeded maximum steps"),
            SimulationError::MaxTimeExceeded => write!(f, "Simulation exceeded maximum time"),
            SimulationError::RuntimeError(e) => write!(f, "Runtime error: {}", e),
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::TestFailed(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coact_core::{Error, Pattern, Value};
    use coact_runtime::Filter;
    use std::time::Duration;

    #[test]
    fn test_simulation_basic() {
        let result = Simulation::new(SimConfig::new(42)).run(|env| {
            env.scheduler
                .block_on(|ctx| async move { Ok(ctx.id().as_u64()) })
        });
        assert!(result.is_ok());
    }

    #[test]
    fn test_simulation_timeout_in_virtual_time() {
        let elapsed = Simulation::new(SimConfig::new(7))
            .run(|env| {
                env.scheduler.block_on(|ctx| async move {
                    ctx.sleep(Duration::from_secs(3600)).await?;
                    Ok(ctx.now())
                })
            })
            .unwrap();
        assert_eq!(elapsed, Duration::from_secs(3600));
    }

    #[test]
    fn test_simulation_reports_test_failure() {
        let result: Result<(), _> = Simulation::new(SimConfig::new(1))
            .run(|_env| Err(Error::failed("expected")));
        assert!(matches!(result, Err(SimulationError::TestFailed(_))));
    }

    #[test]
    fn test_simulation_time_limit() {
        let result = Simulation::new(SimConfig::new(1).with_max_time_ms(1_000)).run(|env| {
            let waited = env.scheduler.block_on(|ctx| async move {
                ctx.receive(
                    Filter::new()
                        .when(Pattern::Any, |_| false)
                        .after(Duration::from_secs(10), || true),
                )
                .await
            });
            // The scheduler was stopped before the timeout could fire
            assert!(matches!(waited, Err(Error::Shutdown)));
            Ok(())
        });
        assert!(matches!(result, Err(SimulationError::MaxTimeExceeded)));
    }

    #[test]
    fn test_injected_message_reaches_actor() {
        let got = Simulation::new(SimConfig::new(3))
            .run(|env| {
                let root = env.scheduler.root().id();
                env.event_loop
                    .inject_after(Duration::from_millis(250), root, Value::atom("tick"));
                let got = env
                    .scheduler
                    .receive(Filter::new().when(Pattern::atom("tick"), |m| m))?;
                Ok((got, env.now_ms()))
            })
            .unwrap();
        assert_eq!(got, (Value::atom("tick"), 250));
    }
}
