//! Refresh statistics.
//!
//! Three counters scoped to one engine instance: refreshes performed,
//! signatures dropped on queue overflow, and duplicate offers deduplicated.
//! Collection is gated on a single enabled flag, set when the config carries
//! a stats logging interval; disabled counters stay zero at no cost beyond
//! the flag check.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::info;

use crate::index::SubscriptionIndex;
use crate::signal::Shutdown;

/// Point-in-time view of the refresh counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Refreshes performed by workers.
    pub refreshes: u64,
    /// Signatures dropped on queue overflow.
    pub dropped: u64,
    /// Duplicate offers discarded by the queue.
    pub deduplicated: u64,
}

/// Engine-scoped refresh counters.
#[derive(Debug)]
pub struct Stats {
    enabled: bool,
    refreshes: AtomicU64,
    dropped: AtomicU64,
    deduplicated: AtomicU64,
}

impl Stats {
    /// Creates counters; increments are no-ops unless `enabled`.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            refreshes: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            deduplicated: AtomicU64::new(0),
        }
    }

    /// Returns whether collection is enabled.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Counts one worker refresh.
    pub fn record_refresh(&self) {
        if self.enabled {
            self.refreshes.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Counts one overflow drop.
    pub fn record_drop(&self) {
        if self.enabled {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Counts one deduplicated offer.
    pub fn record_dedup(&self) {
        if self.enabled {
            self.deduplicated.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Non-destructive read of the counters.
    #[must_use]
    pub fn read(&self) -> StatsSnapshot {
        StatsSnapshot {
            refreshes: self.refreshes.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
        }
    }

    /// Takes the counters, resetting them to zero.
    #[must_use]
    pub fn take(&self) -> StatsSnapshot {
        StatsSnapshot {
            refreshes: self.refreshes.swap(0, Ordering::Relaxed),
            dropped: self.dropped.swap(0, Ordering::Relaxed),
            deduplicated: self.deduplicated.swap(0, Ordering::Relaxed),
        }
    }
}

/// Logger loop: wakes every `interval`, takes the counters, and emits one
/// line with per-second rates and the live view count.
#[allow(clippy::cast_precision_loss)]
pub fn run_logger<K>(
    stats: &Stats,
    index: &SubscriptionIndex<K>,
    shutdown: &Shutdown,
    interval: Duration,
) {
    let secs = interval.as_secs_f64();
    loop {
        if shutdown.wait_timeout(interval) {
            break;
        }
        let snap = stats.take();
        info!(
            refreshes_per_sec = snap.refreshes as f64 / secs,
            dropped_per_sec = snap.dropped as f64 / secs,
            deduplicated_per_sec = snap.deduplicated as f64 / secs,
            active_views = index.active_view_count(),
            "refresh statistics"
        );
    }
}
