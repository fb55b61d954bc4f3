//! Cooperative cancellation flag shared between a job's owner and the worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared "aborted" flag.
///
/// Once set it is never cleared; a new token is created for every job
/// instead of resetting an old one.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    aborted: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the token as aborted. Idempotent; callable from any thread.
    pub fn set_true(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    /// Non-blocking read of the flag.
    pub fn is_true(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(!other.is_true());
        token.set_true();
        token.set_true();
        assert!(other.is_true());
    }

    #[test]
    fn test_fresh_tokens_are_independent() {
        let a = CancellationToken::new();
        a.set_true();
        let b = CancellationToken::new();
        assert!(!b.is_true());
    }

    #[test]
    fn test_set_from_other_thread() {
        let token = CancellationToken::new();
        let remote = token.clone();
        std::thread::spawn(move || remote.set_true())
            .join()
            .unwrap();
        assert!(token.is_true());
    }
}
