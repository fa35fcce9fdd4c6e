//! Message patterns for selective receive
//!
//! TigerStyle: Explicit pattern variants, bounded iterative matching.

use crate::value::{Value, ValueKind};
use std::fmt;
use std::rc::Rc;

/// A pattern matched against a queued message
///
/// Patterns compose: a [`Pattern::Tuple`] holds one sub-pattern per element,
/// and any sub-pattern may itself be a wildcard, a kind test, or a predicate.
#[derive(Clone)]
pub enum Pattern {
    /// Matches every message
    Any,
    /// Matches by structural equality
    Exact(Value),
    /// Matches every value of one kind
    Kind(ValueKind),
    /// Matches a tuple of exactly this arity, element-wise
    Tuple(Vec<Pattern>),
    /// Matches when the predicate returns true
    Predicate(Rc<dyn Fn(&Value) -> bool>),
}

impl Pattern {
    pub fn any() -> Self {
        Self::Any
    }

    pub fn exact(value: impl Into<Value>) -> Self {
        Self::Exact(value.into())
    }

    /// Match the atom `name`
    pub fn atom(name: &str) -> Self {
        Self::Exact(Value::atom(name))
    }

    pub fn kind(kind: ValueKind) -> Self {
        Self::Kind(kind)
    }

    pub fn tuple<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Pattern>,
    {
        Self::Tuple(items.into_iter().map(Into::into).collect())
    }

    pub fn predicate(f: impl Fn(&Value) -> bool + 'static) -> Self {
        Self::Predicate(Rc::new(f))
    }

    /// Check whether `value` matches this pattern
    pub fn matches(&self, value: &Value) -> bool {
        let mut pending: Vec<(&Pattern, &Value)> = vec![(self, value)];

        while let Some((pattern, value)) = pending.pop() {
            let matched = match pattern {
                Self::Any => true,
                Self::Exact(expected) => expected == value,
                Self::Kind(kind) => value.kind() == *kind,
                Self::Predicate(predicate) => predicate(value),
                Self::Tuple(patterns) => match value {
                    Value::Tuple(items) if items.len() == patterns.len() => {
                        // Reversed so elements are checked left to right
                        pending.extend(patterns.iter().zip(items.iter()).rev());
                        true
                    }
                    _ => false,
                },
            };
            if !matched {
                return false;
            }
        }

        true
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::Exact(value) => f.debug_tuple("Exact").field(value).finish(),
            Self::Kind(kind) => f.debug_tuple("Kind").field(kind).finish(),
            Self::Tuple(items) => f.debug_tuple("Tuple").field(items).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<Value> for Pattern {
    fn from(value: Value) -> Self {
        Self::Exact(value)
    }
}

impl From<&str> for Pattern {
    fn from(value: &str) -> Self {
        Self::Exact(Value::from(value))
    }
}

impl From<ValueKind> for Pattern {
    fn from(kind: ValueKind) -> Self {
        Self::Kind(kind)
    }
}
