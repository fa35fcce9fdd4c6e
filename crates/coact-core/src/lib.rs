//! Coact Core
//!
//! Core types, errors, and constants for the Coact actor runtime.
//!
//! # Overview
//!
//! Coact is a single-threaded actor runtime: lightweight cooperative actors
//! communicate only by sending [`Value`] messages to each other's mailboxes,
//! pick messages out with selective receive, and supervise each other through
//! links. This crate holds the pieces shared by the scheduler and its test
//! harness: message terms, patterns, exit reasons, errors, limits,
//! configuration, and the [`Reactor`] interface.
//!
//! # TigerStyle
//!
//! This crate follows [TigerStyle](https://github.com/tigerbeetle/tigerbeetle/blob/main/docs/TIGER_STYLE.md)
//! engineering principles:
//! - Safety > Performance > Developer Experience
//! - Explicit limits with big-endian naming (e.g., `ACTOR_NAME_LENGTH_BYTES_MAX`)
//! - Assertions on preconditions
//! - No recursion (bounded iteration only)

pub mod config;
pub mod constants;
pub mod error;
pub mod exit;
pub mod pattern;
pub mod reactor;
pub mod telemetry;
pub mod timer;
pub mod value;

pub use config::{CoactConfig, FailurePolicy, RunMode, SchedulerConfig};
pub use constants::*;
pub use error::{Error, Result};
pub use exit::ExitReason;
pub use pattern::Pattern;
pub use reactor::{Reactor, ReactorEvent, TimerCallback, TimerId};
pub use telemetry::{init_telemetry, TelemetryConfig};
pub use timer::TimerQueue;
pub use value::{atoms, ActorId, Value, ValueKind};
