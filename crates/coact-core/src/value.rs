//! Message terms and actor identities
//!
//! TigerStyle: Messages are immutable values, compared structurally.
//!
//! Every message that moves between actors is a [`Value`]. Values are cheap
//! to clone (atoms and byte buffers are reference counted), totally ordered,
//! and hashable so they can also be used as dictionary keys.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Well-known atoms used by the runtime protocols
pub mod atoms {
    /// Tag of the message delivered to trapping actors when a link dies
    pub const EXIT: &str = "exit";
    /// Exit reason of an actor whose body completed
    pub const NORMAL: &str = "normal";
    /// Tag of an abnormal exit reason produced by a caught panic
    pub const PANIC: &str = "panic";
    /// Delegator request tag
    pub const CALL: &str = "call";
    /// Delegator success reply tag
    pub const CALL_REPLY: &str = "call_reply";
    /// Delegator failure reply tag
    pub const CALL_ERROR: &str = "call_error";
    /// Delegator shutdown request
    pub const STOP: &str = "stop";
}

/// Unique identity of an actor within one scheduler
///
/// Identities are allocated sequentially and never reused, so an id that was
/// handed out once always refers to the same (possibly dead) actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(u64);

impl ActorId {
    /// Create an id from its raw sequence number
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw sequence number
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<0.{}>", self.0)
    }
}

/// Discriminant of a [`Value`], used for kind-based pattern matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Nil,
    Bool,
    Int,
    Atom,
    Str,
    Bytes,
    Pid,
    Tuple,
    List,
}

/// A message term
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    /// Interned symbol such as `:ping`
    Atom(Arc<str>),
    Str(String),
    Bytes(Bytes),
    Pid(ActorId),
    /// Fixed-arity record, matched element-wise
    Tuple(Vec<Value>),
    List(Vec<Value>),
}

impl Value {
    /// Create an atom
    pub fn atom(name: &str) -> Self {
        debug_assert!(!name.is_empty(), "atom name must not be empty");
        Self::Atom(Arc::from(name))
    }

    /// Create a tuple from its elements
    pub fn tuple<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self::Tuple(items.into_iter().map(Into::into).collect())
    }

    /// Create a list from its elements
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Nil => ValueKind::Nil,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Atom(_) => ValueKind::Atom,
            Self::Str(_) => ValueKind::Str,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::Pid(_) => ValueKind::Pid,
            Self::Tuple(_) => ValueKind::Tuple,
            Self::List(_) => ValueKind::List,
        }
    }

    /// Check whether this value is the atom `name`
    pub fn is_atom(&self, name: &str) -> bool {
        matches!(self, Self::Atom(atom) if &**atom == name)
    }

    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Self::Atom(atom) => Some(atom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_pid(&self) -> Option<ActorId> {
        match self {
            Self::Pid(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Self::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Take the elements out of a tuple
    pub fn into_tuple(self) -> Option<Vec<Value>> {
        match self {
            Self::Tuple(items) => Some(items),
            _ => None,
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("nil"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(n) => write!(f, "{}", n),
            Self::Atom(atom) => write!(f, ":{}", atom),
            Self::Str(s) => write!(f, "{:?}", s),
            Self::Bytes(bytes) => write!(f, "<<{} bytes>>", bytes.len()),
            Self::Pid(id) => write!(f, "{}", id),
            Self::Tuple(items) => {
                f.write_str("{")?;
                write_seq(f, items)?;
                f.write_str("}")
            }
            Self::List(items) => {
                f.write_str("[")?;
                write_seq(f, items)?;
                f.write_str("]")
            }
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Self::Nil
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Bytes> for Value {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<ActorId> for Value {
    fn from(value: ActorId) -> Self {
        Self::Pid(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(value)
    }
}
