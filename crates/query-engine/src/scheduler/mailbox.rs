//! Bounded result buffer with overwrite-on-full semantics.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::types::QueryOutcome;

/// Result buffer between one worker (writer) and one view tick (reader).
///
/// When full, publishing drops the oldest undelivered outcome. With the
/// default capacity of 1 this is a single slot where the last write wins.
#[derive(Debug)]
pub struct ResultMailbox {
    capacity: usize,
    slots: Mutex<VecDeque<QueryOutcome>>,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl ResultMailbox {
    /// Create a mailbox holding at most `capacity` outcomes (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            slots: Mutex::new(VecDeque::with_capacity(capacity)),
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    fn slots(&self) -> MutexGuard<'_, VecDeque<QueryOutcome>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store an outcome, evicting the oldest one if the mailbox is full.
    pub fn publish(&self, outcome: QueryOutcome) {
        let mut slots = self.slots();
        while slots.len() >= self.capacity {
            slots.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        slots.push_back(outcome);
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Take an outcome without blocking.
    ///
    /// With `last_only` the newest outcome is returned and every older one is
    /// discarded; otherwise the oldest outcome is returned.
    pub fn pop(&self, last_only: bool) -> Option<QueryOutcome> {
        let mut slots = self.slots();
        if last_only {
            let last = slots.pop_back();
            let stale = slots.len() as u64;
            if stale > 0 {
                slots.clear();
                self.dropped.fetch_add(stale, Ordering::Relaxed);
            }
            last
        } else {
            slots.pop_front()
        }
    }

    /// Discard every undelivered outcome.
    pub fn clear(&self) {
        self.slots().clear();
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of outcomes ever published.
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Number of outcomes dropped without being delivered.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for ResultMailbox {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(job_id: u64) -> QueryOutcome {
        QueryOutcome::Failed {
            job_id,
            message: String::new(),
        }
    }

    #[test]
    fn test_single_slot_keeps_latest() {
        let mailbox = ResultMailbox::default();
        mailbox.publish(failed(1));
        mailbox.publish(failed(2));
        assert_eq!(mailbox.len(), 1);
        assert_eq!(mailbox.pop(true).map(|o| o.job_id()), Some(2));
        assert!(mailbox.pop(true).is_none());
        assert_eq!(mailbox.dropped_count(), 1);
        assert_eq!(mailbox.published_count(), 2);
    }

    #[test]
    fn test_last_only_drops_older() {
        let mailbox = ResultMailbox::new(4);
        for id in 1..=3 {
            mailbox.publish(failed(id));
        }
        assert_eq!(mailbox.pop(true).map(|o| o.job_id()), Some(3));
        assert!(mailbox.is_empty());
        assert_eq!(mailbox.dropped_count(), 2);
    }

    #[test]
    fn test_fifo_pop() {
        let mailbox = ResultMailbox::new(2);
        for id in 1..=3 {
            mailbox.publish(failed(id));
        }
        assert_eq!(mailbox.pop(false).map(|o| o.job_id()), Some(2));
        assert_eq!(mailbox.pop(false).map(|o| o.job_id()), Some(3));
        assert!(mailbox.pop(false).is_none());
    }

    #[test]
    fn test_zero_capacity_is_one() {
        let mailbox = ResultMailbox::new(0);
        assert_eq!(mailbox.capacity(), 1);
    }
}
