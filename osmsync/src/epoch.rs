//! Connection epoch guard.
//!
//! Every request captures the epoch that was live when it was issued. The
//! epoch advances on reset, re-authentication and server switch; a response
//! whose captured epoch no longer matches is discarded as "connection
//! switched".

use std::sync::atomic::{AtomicU64, Ordering};

/// A connection generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(pub u64);

impl Epoch {
    /// The epoch a fresh session starts in.
    pub const INITIAL: Self = Self(1);

    /// Returns the raw counter value.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Epoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic connection counter shared by every request of a session.
#[derive(Debug)]
pub struct ConnectionEpoch {
    current: AtomicU64,
}

impl ConnectionEpoch {
    /// Creates a counter at [`Epoch::INITIAL`].
    pub fn new() -> Self {
        Self {
            current: AtomicU64::new(Epoch::INITIAL.0),
        }
    }

    /// Returns the live epoch.
    pub fn current(&self) -> Epoch {
        Epoch(self.current.load(Ordering::SeqCst))
    }

    /// Advances to the next epoch and returns it.
    pub fn advance(&self) -> Epoch {
        Epoch(self.current.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// True if `captured` is still the live epoch.
    pub fn is_current(&self, captured: Epoch) -> bool {
        self.current() == captured
    }
}

impl Default for ConnectionEpoch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_initial() {
        let epoch = ConnectionEpoch::new();
        assert_eq!(epoch.current(), Epoch::INITIAL);
    }

    #[test]
    fn test_advance_strictly_increases() {
        let epoch = ConnectionEpoch::new();
        let before = epoch.current();
        let after = epoch.advance();
        assert!(after > before);
        assert_eq!(epoch.current(), after);
        assert!(epoch.advance() > after);
    }

    #[test]
    fn test_captured_epoch_goes_stale() {
        let epoch = ConnectionEpoch::new();
        let captured = epoch.current();
        assert!(epoch.is_current(captured));

        epoch.advance();
        assert!(!epoch.is_current(captured));
    }
}
