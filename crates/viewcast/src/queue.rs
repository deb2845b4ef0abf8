//! Bounded deduplicating refresh queue.
//!
//! FIFO of view signatures scheduled for recomputation. An offer against a
//! signature already queued reports a duplicate; an offer against a full
//! queue reports overflow and the signature is discarded (drop-newest — the
//! next relevant hint re-enqueues it). Workers block on [`RefreshQueue::poll`]
//! with a timeout so they can periodically observe the shutdown flag, and
//! [`RefreshQueue::close`] wakes every blocked poller immediately.
//!
//! The membership set and the deque live under one lock, so deduplication
//! here is exact; the worker-side hash comparison independently neutralizes
//! any duplicate that slips in through a re-enqueue after a pop.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use fxhash::FxHashSet;
use parking_lot::{Condvar, Mutex};

use crate::view::ViewSignature;

/// Result of offering a signature to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    /// Appended to the tail.
    Enqueued,
    /// Already queued; discarded.
    Duplicate,
    /// Queue at capacity; discarded.
    Full,
}

#[derive(Debug)]
struct QueueInner {
    deque: VecDeque<ViewSignature>,
    members: FxHashSet<ViewSignature>,
    closed: bool,
}

/// Bounded FIFO of signatures pending refresh, deduplicating on enqueue.
#[derive(Debug)]
pub struct RefreshQueue {
    capacity: usize,
    inner: Mutex<QueueInner>,
    available: Condvar,
}

impl RefreshQueue {
    /// Creates a queue with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(QueueInner {
                deque: VecDeque::new(),
                members: FxHashSet::default(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Offers a signature for refresh.
    ///
    /// The caller decides what a [`OfferOutcome::Duplicate`] or
    /// [`OfferOutcome::Full`] means for statistics and logging.
    pub fn offer(&self, sig: &ViewSignature) -> OfferOutcome {
        let mut inner = self.inner.lock();
        if inner.members.contains(sig) {
            return OfferOutcome::Duplicate;
        }
        if inner.deque.len() >= self.capacity {
            return OfferOutcome::Full;
        }
        inner.members.insert(sig.clone());
        inner.deque.push_back(sig.clone());
        drop(inner);
        self.available.notify_one();
        OfferOutcome::Enqueued
    }

    /// Pops the head, blocking up to `timeout`.
    ///
    /// Returns `None` on timeout or once the queue is closed and drained.
    pub fn poll(&self, timeout: Duration) -> Option<ViewSignature> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        loop {
            if let Some(sig) = inner.deque.pop_front() {
                inner.members.remove(&sig);
                return Some(sig);
            }
            if inner.closed {
                return None;
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let _ = self.available.wait_for(&mut inner, deadline - now);
        }
    }

    /// Closes the queue, waking every blocked poller.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        drop(inner);
        self.available.notify_all();
    }

    /// Drops all queued signatures.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.deque.clear();
        inner.members.clear();
    }

    /// Number of queued signatures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().deque.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().deque.is_empty()
    }

    /// Snapshot of the queue contents in FIFO order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ViewSignature> {
        self.inner.lock().deque.iter().cloned().collect()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn sig(view: &str) -> ViewSignature {
        ViewSignature::with_namespace("a", view, vec![])
    }

    #[test]
    fn test_queue_fifo_order() {
        let q = RefreshQueue::new(16);
        assert_eq!(q.offer(&sig("x")), OfferOutcome::Enqueued);
        assert_eq!(q.offer(&sig("y")), OfferOutcome::Enqueued);
        assert_eq!(q.offer(&sig("z")), OfferOutcome::Enqueued);

        assert_eq!(q.poll(Duration::ZERO), Some(sig("x")));
        assert_eq!(q.poll(Duration::ZERO), Some(sig("y")));
        assert_eq!(q.poll(Duration::ZERO), Some(sig("z")));
        assert_eq!(q.poll(Duration::ZERO), None);
    }

    #[test]
    fn test_queue_dedup_on_offer() {
        let q = RefreshQueue::new(16);
        assert_eq!(q.offer(&sig("x")), OfferOutcome::Enqueued);
        assert_eq!(q.offer(&sig("x")), OfferOutcome::Duplicate);
        assert_eq!(q.len(), 1);

        // after a pop the signature may be offered again
        let _ = q.poll(Duration::ZERO);
        assert_eq!(q.offer(&sig("x")), OfferOutcome::Enqueued);
    }

    #[test]
    fn test_queue_overflow_drops_newest() {
        let q = RefreshQueue::new(1);
        assert_eq!(q.offer(&sig("x")), OfferOutcome::Enqueued);
        assert_eq!(q.offer(&sig("y")), OfferOutcome::Full);
        assert_eq!(q.snapshot(), vec![sig("x")]);
    }

    #[test]
    fn test_queue_poll_times_out() {
        let q = RefreshQueue::new(4);
        let started = Instant::now();
        assert_eq!(q.poll(Duration::from_millis(30)), None);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_queue_poll_wakes_on_offer() {
        let q = Arc::new(RefreshQueue::new(4));
        let q2 = Arc::clone(&q);
        let handle = thread::spawn(move || q2.poll(Duration::from_secs(5)));

        thread::sleep(Duration::from_millis(20));
        q.offer(&sig("x"));
        assert_eq!(handle.join().unwrap(), Some(sig("x")));
    }

    #[test]
    fn test_queue_close_wakes_pollers() {
        let q = Arc::new(RefreshQueue::new(4));
        let q2 = Arc::clone(&q);
        let handle = thread::spawn(move || q2.poll(Duration::from_secs(30)));

        thread::sleep(Duration::from_millis(20));
        q.close();
        assert_eq!(handle.join().unwrap(), None);
    }

    #[test]
    fn test_queue_close_drains_remaining() {
        let q = RefreshQueue::new(4);
        q.offer(&sig("x"));
        q.close();

        // closed but not yet drained: the queued item is still handed out
        assert_eq!(q.poll(Duration::ZERO), Some(sig("x")));
        assert_eq!(q.poll(Duration::ZERO), None);
    }
}
