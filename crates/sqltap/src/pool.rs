//! Process-wide open-session counter.
//!
//! One shared atomic, incremented when a capture session opens and
//! decremented (never below zero) when it closes. Read non-exclusively for
//! the `totalPoolCount` field of every event. This is the only
//! cross-session shared state in the pipeline; it lives for the life of
//! the process.

use std::sync::atomic::{AtomicU64, Ordering};

static OPEN_SESSIONS: AtomicU64 = AtomicU64::new(0);

/// Record a session opening. Returns the new count.
pub fn increment() -> u64 {
    OPEN_SESSIONS.fetch_add(1, Ordering::SeqCst) + 1
}

/// Record a session closing, never dropping below zero. Returns the new
/// count.
pub fn decrement() -> u64 {
    let previous = OPEN_SESSIONS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
            Some(n.saturating_sub(1))
        })
        .unwrap_or(0);
    previous.saturating_sub(1)
}

/// Current open-session count.
pub fn current() -> u64 {
    OPEN_SESSIONS.load(Ordering::SeqCst)
}
