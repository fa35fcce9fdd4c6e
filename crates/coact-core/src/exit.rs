//! Actor exit reasons
//!
//! TigerStyle: Death is an explicit tagged value threaded through the
//! scheduler, never an unwinding side channel.

use crate::value::{atoms, Value};
use std::fmt;

/// Why an actor stopped running
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The body completed
    Normal,
    /// The body failed, was killed by a linked actor, or panicked
    Error(Value),
}

impl ExitReason {
    /// Create an abnormal exit reason
    pub fn error(reason: impl Into<Value>) -> Self {
        Self::Error(reason.into())
    }

    /// Decode a reason received in an exit message
    pub fn from_value(value: Value) -> Self {
        if value.is_atom(atoms::NORMAL) {
            Self::Normal
        } else {
            Self::Error(value)
        }
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, Self::Normal)
    }

    /// The reason as carried in `{:exit, pid, reason}` messages
    pub fn to_value(&self) -> Value {
        match self {
            Self::Normal => Value::atom(atoms::NORMAL),
            Self::Error(reason) => reason.clone(),
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("normal"),
            Self::Error(reason) => write!(f, "{}", reason),
        }
    }
}
