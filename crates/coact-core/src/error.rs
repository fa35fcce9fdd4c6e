//! Error types for Coact
//!
//! TigerStyle: Explicit error types with context, using thiserror.

use crate::value::{ActorId, Value};
use thiserror::Error;

/// Result type alias for Coact operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coact error types
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Actor Errors
    // =========================================================================
    #[error("Actor not found: {id}")]
    ActorNotFound { id: String },

    #[error("Actor is dead: {id}")]
    DeadActor { id: ActorId },

    /// Raised by an actor body to exit with an arbitrary reason
    #[error("Actor failed: {reason}")]
    ActorFailed { reason: Value },

    #[error("Actor exited: {id}, reason: {reason}")]
    ActorExited { id: ActorId, reason: Value },

    #[error("Actor limit reached: {count} live actors, limit: {limit}")]
    ActorLimitReached { count: usize, limit: usize },

    // =========================================================================
    // Receive Errors (contract violations, reported to the caller)
    // =========================================================================
    #[error("Receive filter has no rules and no timeout")]
    EmptyFilter,

    #[error("Receive timeout already specified")]
    TimeoutAlreadySpecified,

    #[error("Receive timeout too long: {timeout_ms} ms exceeds limit of {limit_ms} ms")]
    TimeoutTooLong { timeout_ms: u64, limit_ms: u64 },

    #[error("Not in actor context: {operation}")]
    NotInActorContext { operation: String },

    // =========================================================================
    // Registry Errors
    // =========================================================================
    #[error("Name already registered: {name} held by {holder}")]
    NameTaken { name: String, holder: ActorId },

    #[error("Invalid actor name: {name:?}, reason: {reason}")]
    InvalidName { name: String, reason: String },

    // =========================================================================
    // Scheduler Errors
    // =========================================================================
    #[error("Scheduler is already running")]
    SchedulerReentered,

    #[error("Deadlock: {id} is waiting with nothing runnable and no event sources")]
    Deadlock { id: ActorId },

    #[error("Scheduler shut down")]
    Shutdown,

    // =========================================================================
    // Delegator Errors
    // =========================================================================
    #[error("Call failed: {method}, reason: {reason}")]
    CallFailed { method: String, reason: Value },

    #[error("Call timed out: {method} after {timeout_ms} ms")]
    CallTimeout { method: String, timeout_ms: u64 },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {field}, reason: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {reason}")]
    Internal { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create an actor not found error
    pub fn actor_not_found(id: impl ToString) -> Self {
        Self::ActorNotFound { id: id.to_string() }
    }

    /// Create an error that makes the current actor exit with `reason`
    pub fn failed(reason: impl Into<Value>) -> Self {
        Self::ActorFailed {
            reason: reason.into(),
        }
    }

    /// Create a not-in-actor-context error
    pub fn not_in_actor_context(operation: impl Into<String>) -> Self {
        Self::NotInActorContext {
            operation: operation.into(),
        }
    }

    /// Create an internal error
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// The exit reason carried to linked actors when a body returns this error
    ///
    /// Explicit failures and propagated exits keep their original reason so
    /// a chain of linked actors all report the same value.
    pub fn exit_value(&self) -> Value {
        match self {
            Self::ActorFailed { reason } => reason.clone(),
            Self::ActorExited { reason, .. } => reason.clone(),
            Self::CallFailed { reason, .. } => reason.clone(),
            other => Value::Str(other.to_string()),
        }
    }

    /// Check if this error is a misuse of the receive/actor API
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::EmptyFilter
                | Self::TimeoutAlreadySpecified
                | Self::TimeoutTooLong { .. }
                | Self::NotInActorContext { .. }
        )
    }
}
