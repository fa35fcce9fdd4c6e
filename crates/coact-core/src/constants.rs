//! TigerStyle constants for Coact
//!
//! All limits are explicit, use big-endian naming (most significant first),
//! and include units in the name.

// =============================================================================
// Actor Limits
// =============================================================================

/// Maximum length of a registered actor name in bytes
pub const ACTOR_NAME_LENGTH_BYTES_MAX: usize = 255;

/// Maximum number of live actors per scheduler
pub const ACTOR_COUNT_MAX: usize = 1_000_000;

/// Default limit on live actors per scheduler
pub const ACTOR_COUNT_DEFAULT: usize = 100_000;

// =============================================================================
// Mailbox Limits
// =============================================================================

/// Mailbox depth at which a warning is logged
///
/// Mailboxes are unbounded; selective receive leaves unmatched messages in
/// place, so a growing queue usually means a filter never matches.
pub const MAILBOX_DEPTH_WARN_COUNT: usize = 10_000;

/// Maximum receive timeout in milliseconds (7 days)
pub const RECEIVE_TIMEOUT_MS_MAX: u64 = 7 * 24 * 60 * 60 * 1000;

/// Default receive timeout ceiling in milliseconds (24 hours)
pub const RECEIVE_TIMEOUT_MS_DEFAULT: u64 = 24 * 60 * 60 * 1000;

// =============================================================================
// Reactor Limits
// =============================================================================

/// Maximum number of injected messages drained per reactor iteration
pub const REACTOR_EVENTS_PER_POLL_COUNT_MAX: usize = 1024;

// =============================================================================
// DST Limits
// =============================================================================

/// Maximum reactor iterations in a simulation before forced termination
pub const DST_STEPS_COUNT_MAX: u64 = 10_000_000;

/// Maximum simulated time in milliseconds (24 hours)
pub const DST_TIME_MS_MAX: u64 = 24 * 60 * 60 * 1000;

// Compile-time assertions for constant validity
const _: () = {
    assert!(ACTOR_NAME_LENGTH_BYTES_MAX >= 64);
    assert!(ACTOR_COUNT_DEFAULT <= ACTOR_COUNT_MAX);
    assert!(RECEIVE_TIMEOUT_MS_DEFAULT <= RECEIVE_TIMEOUT_MS_MAX);
    assert!(REACTOR_EVENTS_PER_POLL_COUNT_MAX > 0);
    assert!(DST_TIME_MS_MAX >= 60 * 1000);
};
