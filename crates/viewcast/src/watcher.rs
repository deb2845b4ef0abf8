//! Hint watcher loop.
//!
//! Wakes at most once per refresh interval, drains the pending hint set,
//! and offers every subscribed signature whose view finds the batch
//! relevant to the refresh queue. The watcher only schedules — it never
//! computes view data — so one pass costs O(subscribed sigs × relevance
//! check). Hints arriving mid-pass merge into the next drain.

use std::fmt;
use std::hash::Hash;
use std::time::Instant;

use crate::server::Shared;

/// Watcher loop body; runs until shutdown.
pub fn run<D, K, C>(shared: &Shared<D, K, C>)
where
    D: Hash,
    K: Clone + Eq + Hash + fmt::Debug,
{
    let interval = shared.config.refresh_interval;
    let mut last_update = Instant::now();

    while !shared.shutdown.is_stopped() {
        let elapsed = last_update.elapsed();
        if elapsed >= interval {
            let hints = shared.hints.drain();
            if !hints.is_empty() {
                shared.refresh_views(&hints);
            }
            last_update = Instant::now();
        } else if shared.shutdown.wait_timeout(interval - elapsed) {
            break;
        }
    }
}
