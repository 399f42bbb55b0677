//! Signal-once shutdown primitive.
//!
//! A subscriber can be stopped by `Hub::unsubscribe` and by its cancellation
//! watcher, possibly at the same time. Both call [`Shutdown::fire`]; only the
//! first call does anything.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A one-shot signal that tolerates any number of `fire` attempts.
///
/// Clones share the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    fired: Arc<AtomicBool>,
    token: CancellationToken,
}

impl Shutdown {
    /// Create a new, unfired signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal.
    ///
    /// Returns `true` only for the call that actually fired it.
    pub fn fire(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.token.cancel();
        true
    }

    /// Check if the signal has fired.
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the signal fires.
    ///
    /// Completes immediately if it already has.
    pub async fn fired(&self) {
        self.token.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fire_once() {
        let quit = Shutdown::new();
        assert!(!quit.is_fired());

        assert!(quit.fire());
        assert!(quit.is_fired());

        // Second fire is a no-op
        assert!(!quit.fire());
        assert!(quit.is_fired());
    }

    #[test]
    fn test_clones_share_state() {
        let quit = Shutdown::new();
        let other = quit.clone();

        assert!(other.fire());
        assert!(quit.is_fired());
        assert!(!quit.fire());
    }

    #[test]
    fn test_concurrent_fire_single_winner() {
        let quit = Shutdown::new();

        let winners: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let quit = quit.clone();
                    s.spawn(move || quit.fire())
                })
                .collect();
            handles
                .into_iter()
                .map(|h| usize::from(h.join().unwrap()))
                .sum()
        });

        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_fired_wakes_waiter() {
        let quit = Shutdown::new();
        let waiter = {
            let quit = quit.clone();
            tokio::spawn(async move { quit.fired().await })
        };

        quit.fire();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();

        // Already fired: completes immediately
        quit.fired().await;
    }
}
