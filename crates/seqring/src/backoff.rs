use crate::shim::{hint, thread};

/// Paces retries after a slot claim was lost to a concurrent peer.
///
/// The first retries spin with an exponentially growing burst of PAUSE hints
/// (1, 2, 4 .. 64); every retry after that yields the thread. It never gives
/// up: a lost claim means a peer is mid-operation on the same position, and
/// its publish clears the contention.
#[derive(Debug, Clone, Default)]
pub struct Backoff {
    retries: u32,
}

impl Backoff {
    /// Retries that spin before the first yield.
    const SPIN_RETRIES: u32 = 7;

    /// Creates a fresh pacer.
    #[inline]
    pub const fn new() -> Self {
        Self { retries: 0 }
    }

    /// Waits before the next attempt.
    #[inline]
    pub fn snooze(&mut self) {
        if self.retries < Self::SPIN_RETRIES {
            for _ in 0..1u32 << self.retries {
                hint::spin_loop();
            }
        } else {
            thread::yield_now();
        }
        self.retries = self.retries.saturating_add(1);
    }

    /// Retries paced so far.
    #[inline]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// True once spinning is over and each retry yields.
    #[inline]
    pub fn is_yielding(&self) -> bool {
        self.retries >= Self::SPIN_RETRIES
    }

    /// Starts over with the shortest spin.
    #[inline]
    pub fn reset(&mut self) {
        self.retries = 0;
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;

    #[test]
    fn test_spins_then_yields() {
        let mut backoff = Backoff::new();
        for _ in 0..Backoff::SPIN_RETRIES {
            assert!(!backoff.is_yielding());
            backoff.snooze();
        }
        assert!(backoff.is_yielding());
        assert_eq!(backoff.retries(), Backoff::SPIN_RETRIES);

        backoff.reset();
        assert_eq!(backoff.retries(), 0);
        assert!(!backoff.is_yielding());
    }

    #[test]
    fn test_keeps_pacing_past_spin_phase() {
        let mut backoff = Backoff::default();
        for _ in 0..100 {
            backoff.snooze();
        }
        assert_eq!(backoff.retries(), 100);
        assert!(backoff.is_yielding());
    }
}
