//! Actor mailbox implementation
//!
//! TigerStyle: Arrival-ordered queue, selective removal by position, at most
//! one pending receive timer.

use crate::filter::Filter;
use coact_core::constants::MAILBOX_DEPTH_WARN_COUNT;
use coact_core::{TimerId, Value};
use std::collections::VecDeque;
use tracing::warn;

/// Per-actor message queue
///
/// # TigerStyle
/// - FIFO arrival order, unmatched messages never reordered
/// - Unbounded, with a logged warning past `MAILBOX_DEPTH_WARN_COUNT`
/// - Matching never holds the queue borrowed while user code runs
#[derive(Debug, Default)]
pub struct Mailbox {
    /// Pending messages in arrival order
    queue: VecDeque<Value>,
    /// Timer armed by the receive currently waiting, if any
    pending_timer: Option<TimerId>,
    /// Generation of `pending_timer`; stale timer callbacks compare against it
    timer_generation: u64,
    /// Set when the pending timer fired before a message matched
    timed_out: bool,
    /// Total messages enqueued (for metrics)
    enqueued_count: u64,
    /// Total messages removed by a matching receive (for metrics)
    processed_count: u64,
}

/// Outcome of scanning the queue with a filter
#[derive(Debug)]
pub(crate) enum Selection {
    /// The earliest matching message, removed from the queue, and its rule
    Matched { message: Value, rule: usize },
    /// Nothing matched and the timeout has elapsed
    TimedOut,
    /// Nothing matched; the receiver must wait
    NoMatch,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message
    pub fn push(&mut self, message: Value) {
        self.queue.push_back(message);
        self.enqueued_count = self.enqueued_count.wrapping_add(1);

        if self.queue.len() == MAILBOX_DEPTH_WARN_COUNT {
            warn!(
                depth = self.queue.len(),
                "mailbox depth reached warning threshold; a receive filter may never match"
            );
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Messages currently queued, oldest first
    pub fn messages(&self) -> impl Iterator<Item = &Value> {
        self.queue.iter()
    }

    /// Get total messages enqueued
    pub fn enqueued_count(&self) -> u64 {
        self.enqueued_count
    }

    /// Get total messages taken by a receive
    pub fn processed_count(&self) -> u64 {
        self.processed_count
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub(crate) fn pending_timer(&self) -> Option<TimerId> {
        self.pending_timer
    }

    /// Record a newly armed receive timer and return its generation
    pub(crate) fn arm_timer(&mut self, timer: TimerId, generation: u64) {
        debug_assert!(self.pending_timer.is_none(), "receive timer already armed");
        debug_assert_eq!(generation, self.timer_generation);

        self.pending_timer = Some(timer);
        self.timed_out = false;
    }

    /// Reserve the generation for the next timer
    pub(crate) fn next_timer_generation(&mut self) -> u64 {
        self.timer_generation = self.timer_generation.wrapping_add(1);
        self.timer_generation
    }

    /// Mark the pending timer as fired if `generation` is still current
    ///
    /// Returns false for callbacks of timers that were already released.
    pub(crate) fn fire_timer(&mut self, generation: u64) -> bool {
        if self.pending_timer.is_none() || generation != self.timer_generation {
            return false;
        }
        self.pending_timer = None;
        self.timed_out = true;
        true
    }

    /// Release the receive timer state, returning a timer still to cancel
    pub(crate) fn release_timer(&mut self) -> Option<TimerId> {
        self.timed_out = false;
        self.pending_timer.take()
    }

    /// Scan from the head and remove the first message any rule matches
    ///
    /// The queue is detached while user patterns run, so predicates may send
    /// to this mailbox; such messages are appended after the scan commits.
    pub(crate) fn select_from<T>(
        cell: &std::cell::RefCell<Mailbox>,
        filter: &Filter<'_, T>,
    ) -> Selection {
        let mut queue = std::mem::take(&mut cell.borrow_mut().queue);

        let mut hit = None;
        for (index, message) in queue.iter().enumerate() {
            if let Some(rule) = filter.match_rule(message) {
                hit = Some((index, rule));
                break;
            }
        }
        let matched = hit.and_then(|(index, rule)| queue.remove(index).map(|m| (m, rule)));

        let mut mailbox = cell.borrow_mut();
        let late = std::mem::replace(&mut mailbox.queue, queue);
        mailbox.queue.extend(late);

        if let Some((message, rule)) = matched {
            mailbox.processed_count = mailbox.processed_count.wrapping_add(1);
            return Selection::Matched { message, rule };
        }

        match filter.timeout() {
            Some(timeout) if timeout.is_zero() || mailbox.timed_out => Selection::TimedOut,
            _ => Selection::NoMatch,
        }
    }

    /// Drop every queued message, returning how many were discarded
    pub(crate) fn clear(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coact_core::Pattern;
    use std::cell::RefCell;
    use std::time::Duration;

    fn mailbox_with(messages: &[&str]) -> RefCell<Mailbox> {
        let mut mailbox = Mailbox::new();
        for message in messages {
            mailbox.push(Value::from(*message));
        }
        RefCell::new(mailbox)
    }

    #[test]
    fn test_mailbox_push_preserves_order() {
        let cell = mailbox_with(&["op1", "op2", "op3"]);
        let mailbox = cell.borrow();
        assert_eq!(mailbox.len(), 3);
        let order: Vec<_> = mailbox.messages().cloned().collect();
        assert_eq!(
            order,
            vec![Value::from("op1"), Value::from("op2"), Value::from("op3")]
        );
    }

    #[test]
    fn test_select_takes_earliest_match_and_keeps_rest_in_order() {
        let cell = mailbox_with(&["first", "second", "third"]);
        // Rule order does not matter: arrival order decides
        let filter = Filter::new()
            .when(Pattern::from("third"), |m| m)
            .when(Pattern::from("first"), |m| m)
            .when(Pattern::from("second"), |m| m);

        match Mailbox::select_from(&cell, &filter) {
            Selection::Matched { message, rule } => {
                assert_eq!(message, Value::from("first"));
                assert_eq!(rule, 1);
            }
            other => panic!("expected a match, got {:?}", other),
        }

        let rest: Vec<_> = cell.borrow().messages().cloned().collect();
        assert_eq!(rest, vec![Value::from("second"), Value::from("third")]);
        assert_eq!(cell.borrow().processed_count(), 1);
    }

    #[test]
    fn test_select_no_match_leaves_queue_untouched() {
        let cell = mailbox_with(&["a", "b"]);
        let filter = Filter::new().when(Pattern::from("z"), |m| m);

        assert!(matches!(
            Mailbox::select_from(&cell, &filter),
            Selection::NoMatch
        ));
        assert_eq!(cell.borrow().len(), 2);
    }

    #[test]
    fn test_select_zero_timeout() {
        let cell = mailbox_with(&["bar"]);
        let filter = Filter::new()
            .when(Pattern::atom("foo"), |_| "wrong")
            .after(Duration::ZERO, || "right");

        assert!(matches!(
            Mailbox::select_from(&cell, &filter),
            Selection::TimedOut
        ));
        assert_eq!(cell.borrow().len(), 1);
    }

    #[test]
    fn test_select_match_beats_elapsed_timeout() {
        let cell = mailbox_with(&["late"]);
        {
            let mut mailbox = cell.borrow_mut();
            let generation = mailbox.next_timer_generation();
            mailbox.arm_timer(TimerId::new(1), generation);
            assert!(mailbox.fire_timer(generation));
        }
        let filter = Filter::new()
            .when(Pattern::from("late"), |_| "message")
            .after(Duration::from_millis(10), || "timeout");

        assert!(matches!(
            Mailbox::select_from(&cell, &filter),
            Selection::Matched { .. }
        ));
    }

    #[test]
    fn test_predicate_can_append_during_scan() {
        let cell = std::rc::Rc::new(mailbox_with(&["a", "b"]));
        let sink = cell.clone();
        let filter = Filter::new().when(
            Pattern::predicate(move |m| {
                sink.borrow_mut().push(Value::from("appended"));
                *m == Value::from("b")
            }),
            |m| m,
        );

        assert!(matches!(
            Mailbox::select_from(&cell, &filter),
            Selection::Matched { .. }
        ));
        let rest: Vec<_> = cell.borrow().messages().cloned().collect();
        assert_eq!(
            rest,
            vec![
                Value::from("a"),
                Value::from("appended"),
                Value::from("appended")
            ]
        );
    }

    #[test]
    fn test_stale_timer_generation_is_ignored() {
        let mut mailbox = Mailbox::new();
        let first = mailbox.next_timer_generation();
        mailbox.arm_timer(TimerId::new(1), first);
        assert_eq!(mailbox.release_timer(), Some(TimerId::new(1)));

        let second = mailbox.next_timer_generation();
        mailbox.arm_timer(TimerId::new(2), second);
        assert!(!mailbox.fire_timer(first));
        assert!(!mailbox.timed_out());
        assert!(mailbox.fire_timer(second));
        assert!(mailbox.timed_out());
        assert_eq!(mailbox.pending_timer(), None);
    }
}
