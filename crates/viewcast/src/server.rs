//! Engine lifecycle and public API.
//!
//! [`ViewServer`] owns the registry, the subscription index, the hint set,
//! the refresh queue, and the background threads that tie them together:
//!
//! ```text
//! put_hints ──┬─ Immediate ────────────────► relevance pass ─┐
//!             └─ Batched ──► hint set ──► watcher (interval) ┘
//!                                                            │
//!                                                   refresh queue (bounded,
//!                                                   deduplicating)
//!                                                            │
//!                  workers ◄─────────────────────────────────┘
//!                     │  view.data → hash → changed? → send_fn per subscriber
//!                     ▼
//!               subscribers
//! ```
//!
//! `subscribe` additionally schedules an asynchronous initial send on a
//! fresh thread, so a new subscriber receives the current value without
//! waiting for the next hint.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, warn};

use crate::config::{HintPolicy, ServerConfig};
use crate::error::{RefreshError, SpawnError, SubscribeError};
use crate::hints::HintSet;
use crate::index::{hash_data, SubscriptionIndex};
use crate::queue::{OfferOutcome, RefreshQueue};
use crate::registry::ViewRegistry;
use crate::signal::Shutdown;
use crate::stats::{run_logger, Stats, StatsSnapshot};
use crate::view::{Hint, View, ViewSignature, ViewUpdate};
use crate::{watcher, worker};

// ---------------------------------------------------------------------------
// Shared
// ---------------------------------------------------------------------------

/// State shared between the API surface and the background threads.
pub(crate) struct Shared<D, K, C = ()> {
    pub(crate) registry: ViewRegistry<D>,
    pub(crate) index: SubscriptionIndex<K>,
    pub(crate) hints: HintSet,
    pub(crate) queue: RefreshQueue,
    pub(crate) stats: Stats,
    pub(crate) shutdown: Shutdown,
    pub(crate) config: ServerConfig<D, K, C>,
}

impl<D, K, C> Shared<D, K, C>
where
    D: Hash,
    K: Clone + Eq + Hash + fmt::Debug,
{
    /// Resolves the effective namespace of a signature arriving at the API
    /// boundary: its own namespace wins; otherwise the configured resolver
    /// is consulted; otherwise it stays absent.
    pub(crate) fn resolve(&self, mut sig: ViewSignature, key: &K, ctx: &C) -> ViewSignature {
        if sig.namespace.is_none() {
            if let Some(namespace_fn) = &self.config.namespace {
                sig.namespace = namespace_fn(&sig, key, ctx);
            }
        }
        sig
    }

    /// Relevance pass: offers every subscribed signature whose view finds
    /// `hints` relevant to the refresh queue.
    pub(crate) fn refresh_views(&self, hints: &[Hint]) {
        if hints.is_empty() {
            return;
        }
        for sig in self.index.subscribed_views() {
            let Some(view) = self.registry.get(&sig.view_id) else {
                warn!(sig = %sig, "relevance pass: view missing from registry");
                continue;
            };
            match view.relevant(sig.namespace.as_ref(), &sig.parameters, hints) {
                Ok(true) => self.schedule(&sig),
                Ok(false) => {}
                Err(e) => error!(sig = %sig, error = %e, "relevance check failed"),
            }
        }
    }

    /// Offers one signature to the refresh queue, accounting for the
    /// outcome.
    fn schedule(&self, sig: &ViewSignature) {
        match self.queue.offer(sig) {
            OfferOutcome::Enqueued => {}
            OfferOutcome::Duplicate => self.stats.record_dedup(),
            OfferOutcome::Full => {
                self.stats.record_drop();
                error!(
                    sig = %sig,
                    capacity = self.config.refresh_queue_size,
                    "refresh queue full, dropping refresh"
                );
            }
        }
    }
}

/// Body of the per-subscribe initial refresh thread.
///
/// Computes the view data and, only if the subscription still exists at
/// that moment, records the hash (set-if-absent) and delivers the payload.
/// A subscription removed mid-compute discards the result silently.
fn initial_refresh<D, K, C>(
    shared: &Shared<D, K, C>,
    view: &Arc<dyn View<D>>,
    sig: &ViewSignature,
    key: &K,
) -> Result<(), RefreshError>
where
    D: Hash,
    K: Clone + Eq + Hash + fmt::Debug,
{
    let data = match view.data(sig.namespace.as_ref(), &sig.parameters) {
        Ok(data) => data,
        Err(e) => {
            error!(sig = %sig, error = %e, "initial refresh: view provider failed");
            return Err(RefreshError::Provider(e));
        }
    };
    let hash = hash_data(&data);

    if !shared.index.complete_initial(sig, key, hash) {
        debug!(sig = %sig, subscriber = ?key, "initial refresh: subscription gone, discarding");
        return Ok(());
    }

    let update = ViewUpdate {
        view_id: sig.view_id.clone(),
        parameters: sig.parameters.clone(),
        data,
    };
    if let Err(e) = (shared.config.send)(key, &update) {
        error!(sig = %sig, subscriber = ?key, error = %e, "initial refresh: send failed");
        return Err(RefreshError::Send(e));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// InitialRefresh
// ---------------------------------------------------------------------------

/// Handle to the asynchronous initial send scheduled by
/// [`ViewServer::subscribe`].
///
/// Becomes ready when the initial refresh completes, successfully or not.
/// Dropping the handle detaches the work; it is primarily a synchronization
/// point for tests and callers that care about delivery of the first value.
#[derive(Debug)]
pub struct InitialRefresh {
    handle: JoinHandle<Result<(), RefreshError>>,
}

impl InitialRefresh {
    /// Blocks until the initial refresh finishes.
    ///
    /// # Errors
    ///
    /// Returns the provider or send failure the refresh ran into, if any.
    /// An unsubscribe racing ahead of the compute is not a failure: the
    /// result is discarded and this returns `Ok`.
    pub fn wait(self) -> Result<(), RefreshError> {
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(RefreshError::Panicked),
        }
    }

    /// Returns `true` once the initial refresh has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

// ---------------------------------------------------------------------------
// ViewServer
// ---------------------------------------------------------------------------

/// View subscription and refresh engine.
///
/// Generic over the view data type `D` (hashed for change suppression), the
/// caller-opaque subscriber key `K`, and the subscribe context `C` handed
/// back to the auth and namespace callbacks.
pub struct ViewServer<D, K, C = ()> {
    shared: Arc<Shared<D, K, C>>,
    threads: Vec<JoinHandle<()>>,
}

impl<D, K, C> ViewServer<D, K, C>
where
    D: Hash + Send + Sync + 'static,
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
    C: 'static,
{
    /// Starts the engine: registers `views` and spawns the worker pool, the
    /// watcher, and (if configured) the stats logger.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError`] if an engine thread cannot be spawned; any
    /// threads spawned up to that point are shut down again.
    pub fn start(
        config: ServerConfig<D, K, C>,
        views: Vec<Arc<dyn View<D>>>,
    ) -> Result<Self, SpawnError> {
        let shared = Arc::new(Shared {
            registry: ViewRegistry::new(),
            index: SubscriptionIndex::new(),
            hints: HintSet::new(),
            queue: RefreshQueue::new(config.refresh_queue_size),
            stats: Stats::new(config.stats_log_interval.is_some()),
            shutdown: Shutdown::new(),
            config,
        });
        shared.registry.add_views(views);

        let mut threads = Vec::new();
        let spawned = Self::spawn_threads(&shared, &mut threads);
        if let Err(e) = spawned {
            shared.shutdown.trigger();
            shared.queue.close();
            for handle in threads {
                let _ = handle.join();
            }
            return Err(e);
        }

        Ok(Self { shared, threads })
    }

    fn spawn_threads(
        shared: &Arc<Shared<D, K, C>>,
        threads: &mut Vec<JoinHandle<()>>,
    ) -> Result<(), SpawnError> {
        for i in 0..shared.config.worker_threads {
            let s = Arc::clone(shared);
            threads.push(spawn_named(format!("refresh-worker-{i}"), move || {
                worker::run(&s);
            })?);
        }

        let s = Arc::clone(shared);
        threads.push(spawn_named("refresh-watcher".to_string(), move || {
            watcher::run(&s);
        })?);

        if let Some(interval) = shared.config.stats_log_interval {
            let s = Arc::clone(shared);
            threads.push(spawn_named("stats-logger".to_string(), move || {
                run_logger(&s.stats, &s.index, &s.shutdown, interval);
            })?);
        }
        Ok(())
    }

    /// Subscribes `key` to the view instantiation named by `sig` and
    /// schedules an asynchronous initial send.
    ///
    /// Returns `Ok(None)` when the configured auth callback refuses the
    /// subscription (after invoking the unauth callback, if any); no state
    /// changes in that case. Otherwise returns a handle that becomes ready
    /// when the initial send completes.
    ///
    /// A duplicate subscribe keeps the index set-semantic but still
    /// schedules a second initial send.
    ///
    /// # Errors
    ///
    /// [`SubscribeError::UnknownView`] if `sig` names an unregistered view;
    /// [`SubscribeError::Spawn`] if the initial-refresh thread cannot be
    /// spawned.
    pub fn subscribe(
        &self,
        sig: ViewSignature,
        key: K,
        ctx: &C,
    ) -> Result<Option<InitialRefresh>, SubscribeError> {
        let sig = self.shared.resolve(sig, &key, ctx);

        let Some(view) = self.shared.registry.get(&sig.view_id) else {
            return Err(SubscribeError::UnknownView(sig.view_id));
        };

        if let Some(auth) = &self.shared.config.auth {
            if !auth(&sig, &key, ctx) {
                if let Some(on_unauth) = &self.shared.config.on_unauth {
                    on_unauth(&sig, &key, ctx);
                }
                return Ok(None);
            }
        }

        self.shared.index.insert(sig.clone(), key.clone());

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("initial-refresh".to_string())
            .spawn(move || initial_refresh(&shared, &view, &sig, &key))
            .map_err(|source| SpawnError {
                thread: "initial-refresh".to_string(),
                source,
            })?;

        Ok(Some(InitialRefresh { handle }))
    }

    /// Removes one subscription, resolving the namespace exactly as
    /// `subscribe` did. Idempotent; an unknown pair is a no-op.
    pub fn unsubscribe(&self, sig: ViewSignature, key: &K, ctx: &C) {
        let sig = self.shared.resolve(sig, key, ctx);
        self.shared.index.remove(&sig, key);
    }

    /// Removes every subscription held by `key`.
    pub fn unsubscribe_all(&self, key: &K) {
        self.shared.index.remove_all(key);
    }

    /// Feeds hints into the engine according to the configured
    /// [`HintPolicy`].
    pub fn put_hints(&self, hints: impl IntoIterator<Item = Hint>) {
        match self.shared.config.hint_policy {
            HintPolicy::Immediate => {
                let hints: Vec<Hint> = hints.into_iter().collect();
                self.shared.refresh_views(&hints);
            }
            HintPolicy::Batched => self.shared.hints.queue(hints),
        }
    }

    /// Runs a relevance pass over the given hints right now, on the caller
    /// thread, scheduling refreshes for every affected signature.
    pub fn refresh_views(&self, hints: &[Hint]) {
        self.shared.refresh_views(hints);
    }

    /// Inserts or replaces view providers.
    pub fn add_views(&self, views: Vec<Arc<dyn View<D>>>) {
        self.shared.registry.add_views(views);
    }
}

impl<D, K, C> ViewServer<D, K, C> {
    /// Snapshot of every signature with at least one subscriber.
    #[must_use]
    pub fn subscribed_views(&self) -> Vec<ViewSignature> {
        self.shared.index.subscribed_views()
    }

    /// Number of signatures with at least one subscriber.
    #[must_use]
    pub fn active_view_count(&self) -> usize {
        self.shared.index.active_view_count()
    }

    /// Non-destructive snapshot of the refresh counters. All zeros unless
    /// a stats logging interval was configured.
    #[must_use]
    pub fn statistics(&self) -> StatsSnapshot {
        self.shared.stats.read()
    }

    /// Stops the engine: triggers the shutdown signal, closes the queue so
    /// blocked workers wake, joins the background threads when `wait`, and
    /// resets registry, subscriptions, hints, and queue to empty.
    /// Idempotent. In-flight initial refreshes find their subscriptions
    /// gone and discard their results.
    pub fn shutdown(&mut self, wait: bool) {
        self.shared.shutdown.trigger();
        self.shared.queue.close();
        if wait {
            for handle in self.threads.drain(..) {
                let _ = handle.join();
            }
        }
        self.shared.index.clear();
        self.shared.hints.clear();
        self.shared.queue.clear();
        self.shared.registry.clear();
    }
}

impl<D, K, C> Drop for ViewServer<D, K, C> {
    fn drop(&mut self) {
        self.shutdown(true);
    }
}

impl<D, K, C> fmt::Debug for ViewServer<D, K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewServer")
            .field("active_views", &self.active_view_count())
            .field("queued_refreshes", &self.shared.queue.len())
            .field("stopped", &self.shared.shutdown.is_stopped())
            .finish_non_exhaustive()
    }
}

fn spawn_named<F>(name: String, f: F) -> Result<JoinHandle<()>, SpawnError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(f)
        .map_err(|source| SpawnError {
            thread: name,
            source,
        })
}

// ===========================================================================
// Tests
// ===========================================================================
