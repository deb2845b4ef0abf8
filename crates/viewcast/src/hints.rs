//! Pending hint set.
//!
//! Hints accumulate deduplicated until the watcher drains them; drain
//! atomically swaps the set empty and is the only reader.

use fxhash::FxHashSet;
use parking_lot::Mutex;

use crate::view::Hint;

/// Deduplicated set of pending invalidation hints.
#[derive(Debug, Default)]
pub struct HintSet {
    hints: Mutex<FxHashSet<Hint>>,
}

impl HintSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges hints into the pending set.
    pub fn queue(&self, hints: impl IntoIterator<Item = Hint>) {
        let mut set = self.hints.lock();
        set.extend(hints);
    }

    /// Atomically takes the current set, leaving it empty.
    #[must_use]
    pub fn drain(&self) -> Vec<Hint> {
        let mut set = self.hints.lock();
        set.drain().collect()
    }

    /// Number of distinct pending hints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hints.lock().len()
    }

    /// Returns `true` if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hints.lock().is_empty()
    }

    /// Drops every pending hint.
    pub fn clear(&self) {
        self.hints.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Scalar;

    fn hint(ns: &str, payload: &str) -> Hint {
        Hint::new(ns, vec![Scalar::from(payload)], "memory")
    }

    #[test]
    fn test_hint_set_dedup() {
        let set = HintSet::new();
        set.queue(vec![hint("a", "foo"), hint("a", "foo"), hint("b", "foo")]);
        set.queue(vec![hint("a", "foo")]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_hint_set_drain_resets() {
        let set = HintSet::new();
        set.queue(vec![hint("a", "foo"), hint("b", "bar")]);

        let drained = set.drain();
        assert_eq!(drained.len(), 2);
        assert!(set.is_empty());
        assert!(set.drain().is_empty());
    }
}
