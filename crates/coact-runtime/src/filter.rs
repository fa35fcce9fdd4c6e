//! Receive filters
//!
//! TigerStyle: Rules are evaluated in declaration order, misuse is reported
//! before any message is examined.

use coact_core::error::{Error, Result};
use coact_core::{Pattern, Value};
use std::time::Duration;

/// Handler run with the matched message
pub type Handler<'a, T> = Box<dyn FnOnce(Value) -> T + 'a>;

/// Handler run when the receive timeout elapses
pub type TimeoutHandler<'a, T> = Box<dyn FnOnce() -> T + 'a>;

/// Ordered (pattern, handler) rules plus an optional timeout
///
/// A filter is built fresh for every receive call:
///
/// ```rust,ignore
/// let reply = ctx
///     .receive(
///         Filter::new()
///             .when(Pattern::atom("pong"), |_| true)
///             .after(Duration::from_millis(100), || false),
///     )
///     .await?;
/// ```
pub struct Filter<'a, T> {
    rules: Vec<(Pattern, Handler<'a, T>)>,
    timeout: Option<(Duration, TimeoutHandler<'a, T>)>,
    timeout_repeated: bool,
}

impl<'a, T> Filter<'a, T> {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            timeout: None,
            timeout_repeated: false,
        }
    }

    /// Add a rule; earlier rules take precedence for the same message
    pub fn when(
        mut self,
        pattern: impl Into<Pattern>,
        handler: impl FnOnce(Value) -> T + 'a,
    ) -> Self {
        self.rules.push((pattern.into(), Box::new(handler)));
        self
    }

    /// Give up after `timeout` without a match and run `handler` instead
    ///
    /// A zero timeout never waits: if nothing already queued matches, the
    /// handler runs immediately. Only one timeout may be given.
    pub fn after(mut self, timeout: Duration, handler: impl FnOnce() -> T + 'a) -> Self {
        if self.timeout.is_some() {
            self.timeout_repeated = true;
        } else {
            self.timeout = Some((timeout, Box::new(handler)));
        }
        self
    }

    /// Check the filter is usable
    pub fn validate(&self, timeout_ms_max: u64) -> Result<()> {
        if self.timeout_repeated {
            return Err(Error::TimeoutAlreadySpecified);
        }

        if self.rules.is_empty() && self.timeout.is_none() {
            return Err(Error::EmptyFilter);
        }

        if let Some(timeout) = self.timeout() {
            let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            if timeout_ms > timeout_ms_max {
                return Err(Error::TimeoutTooLong {
                    timeout_ms,
                    limit_ms: timeout_ms_max,
                });
            }
        }

        Ok(())
    }

    /// Index of the first rule matching `message`
    pub fn match_rule(&self, message: &Value) -> Option<usize> {
        self.rules
            .iter()
            .position(|(pattern, _)| pattern.matches(message))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.as_ref().map(|(timeout, _)| *timeout)
    }

    pub fn rules_count(&self) -> usize {
        self.rules.len()
    }

    /// Consume the filter, running rule `rule` on `message`
    pub(crate) fn dispatch(self, rule: usize, message: Value) -> Result<T> {
        let (_, handler) = self
            .rules
            .into_iter()
            .nth(rule)
            .ok_or_else(|| Error::internal(format!("filter rule {} out of range", rule)))?;
        Ok(handler(message))
    }

    /// Consume the filter, running its timeout handler
    pub(crate) fn dispatch_timeout(self) -> Result<T> {
        let (_, handler) = self
            .timeout
            .ok_or_else(|| Error::internal("filter has no timeout handler"))?;
        Ok(handler())
    }
}

impl<'a, T> Default for Filter<'a, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T> std::fmt::Debug for Filter<'a, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filter")
            .field(
                "patterns",
                &self.rules.iter().map(|(p, _)| p).collect::<Vec<_>>(),
            )
            .field("timeout", &self.timeout())
            .finish()
    }
}
