//! Cooperative cancellation for node run loops.
//!
//! A [`StopToken`] is a cloneable handle to a shared stop flag. The master
//! holds the signalling side; every node run loop (and anything else that
//! needs to observe shutdown) polls its clone at bounded intervals.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable cancellation token.
///
/// All clones observe the same flag. Once stopped, a token can never be
/// re-armed — a new pool gets a new token.
#[derive(Clone, Debug, Default)]
pub struct StopToken {
    flag: Arc<AtomicBool>,
}

impl StopToken {
    /// Create a new, un-stopped token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal stop. Idempotent.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether stop has been requested.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
