//! Subscription index and hash cache.
//!
//! Bidirectional map between subscriber keys and view signatures, plus the
//! cache of last-sent data hashes. The three fields are protected by one
//! coarse lock because the index invariants span all of them:
//!
//! 1. `key ∈ subscribers[sig]` iff `sig ∈ subscribed[key]`
//! 2. no empty buckets are retained on either side
//! 3. a hash entry exists only while its signature has at least one
//!    subscriber
//!
//! Compound mutations are single lock-held read-modify-writes, so every
//! public operation leaves the invariants intact.

use std::hash::{Hash, Hasher};

use fxhash::{FxHashMap, FxHashSet, FxHasher};
use parking_lot::Mutex;

use crate::view::ViewSignature;

/// Hashes view data for change suppression.
pub fn hash_data<D: Hash>(data: &D) -> u64 {
    let mut hasher = FxHasher::default();
    data.hash(&mut hasher);
    hasher.finish()
}

/// Subscribers and cached hash for one signature, snapshotted at the moment
/// a refresh is applied.
#[derive(Debug)]
pub struct RefreshTarget<K> {
    /// Subscribers at snapshot time.
    pub subscribers: Vec<K>,
    /// Hash of the last data sent for this signature, if any.
    pub last_hash: Option<u64>,
}

#[derive(Debug)]
struct IndexState<K> {
    /// key → signatures the key is subscribed to.
    subscribed: FxHashMap<K, FxHashSet<ViewSignature>>,
    /// signature → keys subscribed to it.
    subscribers: FxHashMap<ViewSignature, FxHashSet<K>>,
    /// signature → hash of the last data sent.
    hashes: FxHashMap<ViewSignature, u64>,
}

/// Bidirectional subscription index with the last-sent hash cache.
#[derive(Debug)]
pub struct SubscriptionIndex<K> {
    state: Mutex<IndexState<K>>,
}

impl<K> SubscriptionIndex<K> {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(IndexState {
                subscribed: FxHashMap::default(),
                subscribers: FxHashMap::default(),
                hashes: FxHashMap::default(),
            }),
        }
    }

    /// Snapshot of every signature with at least one subscriber.
    #[must_use]
    pub fn subscribed_views(&self) -> Vec<ViewSignature> {
        self.state.lock().subscribers.keys().cloned().collect()
    }

    /// Number of signatures with at least one subscriber.
    #[must_use]
    pub fn active_view_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    /// Returns `true` if both directions of the index and the hash cache
    /// are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let state = self.state.lock();
        state.subscribed.is_empty() && state.subscribers.is_empty() && state.hashes.is_empty()
    }

    /// Drops every subscription and hash.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.subscribed.clear();
        state.subscribers.clear();
        state.hashes.clear();
    }
}

impl<K: Clone + Eq + Hash> SubscriptionIndex<K> {
    /// Inserts `(sig, key)` into both directions of the index.
    ///
    /// Returns `false` if the pair was already present (set semantics).
    pub fn insert(&self, sig: ViewSignature, key: K) -> bool {
        let mut state = self.state.lock();
        let added = state
            .subscribed
            .entry(key.clone())
            .or_default()
            .insert(sig.clone());
        state.subscribers.entry(sig).or_default().insert(key);
        added
    }

    /// Removes `(sig, key)`, purging empty buckets and — when the last
    /// subscriber leaves — the hash entry. Idempotent.
    pub fn remove(&self, sig: &ViewSignature, key: &K) {
        let mut state = self.state.lock();
        remove_pair(&mut state, sig, key);
    }

    /// Removes every signature subscribed by `key`.
    pub fn remove_all(&self, key: &K) {
        let mut state = self.state.lock();
        let Some(sigs) = state.subscribed.remove(key) else {
            return;
        };
        for sig in sigs {
            if let Some(keys) = state.subscribers.get_mut(&sig) {
                keys.remove(key);
                if keys.is_empty() {
                    state.subscribers.remove(&sig);
                    state.hashes.remove(&sig);
                }
            }
        }
    }

    /// Returns whether `(sig, key)` is currently subscribed.
    #[must_use]
    pub fn contains(&self, sig: &ViewSignature, key: &K) -> bool {
        self.state
            .lock()
            .subscribed
            .get(key)
            .is_some_and(|sigs| sigs.contains(sig))
    }

    /// Snapshot of the signatures one key is subscribed to.
    #[must_use]
    pub fn views_of(&self, key: &K) -> Vec<ViewSignature> {
        self.state
            .lock()
            .subscribed
            .get(key)
            .map(|sigs| sigs.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of the keys subscribed to one signature.
    #[must_use]
    pub fn subscribers_of(&self, sig: &ViewSignature) -> Vec<K> {
        self.state
            .lock()
            .subscribers
            .get(sig)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Cached hash of the last data sent for `sig`.
    #[must_use]
    pub fn hash_of(&self, sig: &ViewSignature) -> Option<u64> {
        self.state.lock().hashes.get(sig).copied()
    }

    /// Subscribers and cached hash in one snapshot, or `None` if the
    /// signature has no subscribers.
    #[must_use]
    pub fn refresh_target(&self, sig: &ViewSignature) -> Option<RefreshTarget<K>> {
        let state = self.state.lock();
        let keys = state.subscribers.get(sig)?;
        Some(RefreshTarget {
            subscribers: keys.iter().cloned().collect(),
            last_hash: state.hashes.get(sig).copied(),
        })
    }

    /// Records the hash of freshly sent data.
    ///
    /// Skipped if the signature lost its last subscriber since the refresh
    /// snapshot; a hash entry must never outlive its subscribers.
    pub fn store_hash(&self, sig: &ViewSignature, hash: u64) {
        let mut state = self.state.lock();
        if state.subscribers.contains_key(sig) {
            state.hashes.insert(sig.clone(), hash);
        }
    }

    /// Initial-refresh completion: if `(sig, key)` is still subscribed,
    /// stores `hash` without overwriting an existing entry and returns
    /// `true` (the caller should send). Returns `false` if the subscription
    /// is gone — the computed result is discarded.
    ///
    /// Set-if-absent keeps a stale initial-send hash from suppressing a
    /// refresh that raced ahead of it.
    pub fn complete_initial(&self, sig: &ViewSignature, key: &K, hash: u64) -> bool {
        let mut state = self.state.lock();
        let still_subscribed = state
            .subscribed
            .get(key)
            .is_some_and(|sigs| sigs.contains(sig));
        if !still_subscribed {
            return false;
        }
        state.hashes.entry(sig.clone()).or_insert(hash);
        true
    }
}

fn remove_pair<K: Eq + Hash>(state: &mut IndexState<K>, sig: &ViewSignature, key: &K) {
    if let Some(sigs) = state.subscribed.get_mut(key) {
        sigs.remove(sig);
        if sigs.is_empty() {
            state.subscribed.remove(key);
        }
    }
    if let Some(keys) = state.subscribers.get_mut(sig) {
        keys.remove(key);
        if keys.is_empty() {
            state.subscribers.remove(sig);
            state.hashes.remove(sig);
        }
    }
}

impl<K> Default for SubscriptionIndex<K> {
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(ns: &str, view: &str) -> ViewSignature {
        ViewSignature::with_namespace(ns, view, vec![])
    }

    #[test]
    fn test_index_bidirectional_consistency() {
        let index: SubscriptionIndex<u64> = SubscriptionIndex::new();
        let s = sig("a", "foo");

        assert!(index.insert(s.clone(), 123));
        assert!(index.contains(&s, &123));
        assert_eq!(index.views_of(&123), vec![s.clone()]);
        assert_eq!(index.subscribers_of(&s), vec![123]);
    }

    #[test]
    fn test_index_insert_is_set_semantic() {
        let index: SubscriptionIndex<u64> = SubscriptionIndex::new();
        let s = sig("a", "foo");

        assert!(index.insert(s.clone(), 123));
        assert!(!index.insert(s.clone(), 123));
        assert_eq!(index.subscribers_of(&s).len(), 1);
        assert_eq!(index.views_of(&123).len(), 1);
    }

    #[test]
    fn test_index_remove_purges_empty_buckets() {
        let index: SubscriptionIndex<u64> = SubscriptionIndex::new();
        let s = sig("a", "foo");

        index.insert(s.clone(), 123);
        index.store_hash(&s, 42);
        index.remove(&s, &123);

        assert!(index.is_empty());
        assert_eq!(index.active_view_count(), 0);
        assert!(index.hash_of(&s).is_none());
    }

    #[test]
    fn test_index_remove_is_idempotent() {
        let index: SubscriptionIndex<u64> = SubscriptionIndex::new();
        let s = sig("a", "foo");

        index.remove(&s, &123);
        index.insert(s.clone(), 123);
        index.remove(&s, &123);
        index.remove(&s, &123);
        assert!(index.is_empty());
    }

    #[test]
    fn test_index_hash_survives_remaining_subscriber() {
        let index: SubscriptionIndex<u64> = SubscriptionIndex::new();
        let s = sig("a", "foo");

        index.insert(s.clone(), 123);
        index.insert(s.clone(), 456);
        index.store_hash(&s, 7);

        index.remove(&s, &123);
        assert_eq!(index.subscribers_of(&s), vec![456]);
        assert_eq!(index.hash_of(&s), Some(7));

        index.remove(&s, &456);
        assert!(index.hash_of(&s).is_none());
    }

    #[test]
    fn test_index_remove_all() {
        let index: SubscriptionIndex<u64> = SubscriptionIndex::new();
        let s1 = sig("a", "foo");
        let s2 = sig("a", "bar");

        index.insert(s1.clone(), 123);
        index.insert(s2.clone(), 123);
        index.insert(s1.clone(), 456);
        index.store_hash(&s1, 1);
        index.store_hash(&s2, 2);

        index.remove_all(&123);

        // s1 keeps its other subscriber and hash, s2 is fully purged
        assert_eq!(index.subscribers_of(&s1), vec![456]);
        assert_eq!(index.hash_of(&s1), Some(1));
        assert!(index.subscribers_of(&s2).is_empty());
        assert!(index.hash_of(&s2).is_none());
        assert!(index.views_of(&123).is_empty());
    }

    #[test]
    fn test_index_store_hash_requires_subscriber() {
        let index: SubscriptionIndex<u64> = SubscriptionIndex::new();
        let s = sig("a", "foo");

        index.store_hash(&s, 42);
        assert!(index.hash_of(&s).is_none());
    }

    #[test]
    fn test_index_complete_initial_set_if_absent() {
        let index: SubscriptionIndex<u64> = SubscriptionIndex::new();
        let s = sig("a", "foo");
        index.insert(s.clone(), 123);

        // A refresh worker already recorded a hash; the initial path must
        // not overwrite it.
        index.store_hash(&s, 1);
        assert!(index.complete_initial(&s, &123, 2));
        assert_eq!(index.hash_of(&s), Some(1));
    }

    #[test]
    fn test_index_complete_initial_after_unsubscribe() {
        let index: SubscriptionIndex<u64> = SubscriptionIndex::new();
        let s = sig("a", "foo");
        index.insert(s.clone(), 123);
        index.remove(&s, &123);

        assert!(!index.complete_initial(&s, &123, 2));
        assert!(index.hash_of(&s).is_none());
    }

    #[test]
    fn test_index_refresh_target_snapshot() {
        let index: SubscriptionIndex<u64> = SubscriptionIndex::new();
        let s = sig("a", "foo");

        assert!(index.refresh_target(&s).is_none());

        index.insert(s.clone(), 123);
        index.insert(s.clone(), 456);
        index.store_hash(&s, 9);

        let target = index.refresh_target(&s).unwrap();
        let mut subs = target.subscribers;
        subs.sort_unstable();
        assert_eq!(subs, vec![123, 456]);
        assert_eq!(target.last_hash, Some(9));
    }

    #[test]
    fn test_index_subscribed_views_union() {
        let index: SubscriptionIndex<u64> = SubscriptionIndex::new();
        let s1 = sig("a", "foo");
        let s2 = sig("b", "bar");

        index.insert(s1.clone(), 123);
        index.insert(s1.clone(), 456);
        index.insert(s2.clone(), 456);

        let mut views = index.subscribed_views();
        views.sort_by(|a, b| a.view_id.cmp(&b.view_id));
        assert_eq!(views, vec![s2, s1]);
        assert_eq!(index.active_view_count(), 2);
    }

    #[test]
    fn test_hash_data_deterministic() {
        assert_eq!(hash_data(&1i64), hash_data(&1i64));
        assert_ne!(hash_data(&1i64), hash_data(&2i64));
    }
}
