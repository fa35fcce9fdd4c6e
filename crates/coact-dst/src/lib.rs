//! Coact DST - Deterministic Simulation Testing
//!
//! TigerBeetle/FoundationDB-style deterministic simulation for the Coact
//! actor runtime.
//!
//! # Overview
//!
//! DST runs a real [`Scheduler`](coact_runtime::Scheduler) against:
//! - Virtual time (SimClock) that jumps to the next deadline
//! - A simulated reactor (SimEventLoop) for timers and injected messages
//! - Reproducible random numbers (DeterministicRng)
//!
//! # Example
//!
//! ```rust,ignore
//! use coact_dst::{SimConfig, Simulation};
//!
//! #[test]
//! fn test_receive_timeout() {
//!     let config = SimConfig::from_env_or_random();
//!     Simulation::new(config)
//!         .run(|env| {
//!             env.scheduler.block_on(|ctx| async move {
//!                 ctx.sleep(std::time::Duration::from_secs(60)).await
//!             })
//!         })
//!         .unwrap();
//! }
//! ```
//!
//! # TigerStyle
//!
//! - All operations are deterministic given the same seed
//! - Always log the seed for reproducibility
//! - Explicit step and time bounds on every run

pub mod clock;
pub mod reactor;
pub mod rng;
pub mod simulation;

pub use clock::SimClock;
pub use reactor::{SimEventLoop, SimLimit};
pub use rng::DeterministicRng;
pub use simulation::{SimConfig, SimEnvironment, Simulation, SimulationError};
