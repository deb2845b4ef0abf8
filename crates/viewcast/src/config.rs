//! Engine configuration.
//!
//! A [`ServerConfig`] is built around the one required collaborator — the
//! send callback — with everything else defaulted. The generic parameters
//! are `D` (view data), `K` (subscriber key), and `C` (opaque subscribe
//! context handed back to the auth and namespace callbacks).

use std::sync::Arc;
use std::time::Duration;

use crate::error::BoxError;
use crate::view::{Namespace, ViewSignature, ViewUpdate};

/// Delivers one view payload to one subscriber.
///
/// Invoked concurrently from many worker threads and from initial-refresh
/// threads. The engine does not retry on failure; errors are logged and
/// swallowed.
pub type SendFn<D, K> = Arc<dyn Fn(&K, &ViewUpdate<D>) -> Result<(), BoxError> + Send + Sync>;

/// Gates subscription. Returning `false` refuses the subscribe with no
/// state change.
pub type AuthFn<K, C> = Arc<dyn Fn(&ViewSignature, &K, &C) -> bool + Send + Sync>;

/// Called after [`AuthFn`] refuses a subscribe, with the same arguments.
pub type OnUnauthFn<K, C> = Arc<dyn Fn(&ViewSignature, &K, &C) + Send + Sync>;

/// Computes the namespace for a signature that arrived without one.
///
/// Must be pure with respect to its inputs and stable across a
/// subscribe/unsubscribe pair: `unsubscribe` re-invokes it to locate the
/// stored signature.
pub type NamespaceFn<K, C> =
    Arc<dyn Fn(&ViewSignature, &K, &C) -> Option<Namespace> + Send + Sync>;

// ---------------------------------------------------------------------------
// HintPolicy
// ---------------------------------------------------------------------------

/// Policy applied to hints arriving through `put_hints`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HintPolicy {
    /// Test relevance and enqueue refreshes on the caller thread,
    /// immediately.
    #[default]
    Immediate,
    /// Merge into the pending hint set; the watcher picks them up on its
    /// next interval.
    Batched,
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Configuration consumed by [`ViewServer::start`](crate::ViewServer::start).
pub struct ServerConfig<D, K, C = ()> {
    /// Required delivery callback.
    pub send: SendFn<D, K>,
    /// What to do with incoming hints.
    pub hint_policy: HintPolicy,
    /// Capacity of the refresh queue.
    pub refresh_queue_size: usize,
    /// Minimum watcher period.
    pub refresh_interval: Duration,
    /// Number of refresh workers. Zero spawns none (refreshes queue up
    /// until dropped).
    pub worker_threads: usize,
    /// Optional subscription gate.
    pub auth: Option<AuthFn<K, C>>,
    /// Optional refusal callback.
    pub on_unauth: Option<OnUnauthFn<K, C>>,
    /// Optional namespace resolver for unnamespaced signatures.
    pub namespace: Option<NamespaceFn<K, C>>,
    /// Enables statistics collection and the periodic log line.
    pub stats_log_interval: Option<Duration>,
}

impl<D, K, C> ServerConfig<D, K, C> {
    /// Creates a configuration with the given send callback and defaults for
    /// everything else: immediate hint policy, queue capacity 1000, 1 s
    /// refresh interval, 8 workers, no auth, statistics disabled.
    pub fn new<F>(send: F) -> Self
    where
        F: Fn(&K, &ViewUpdate<D>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            send: Arc::new(send),
            hint_policy: HintPolicy::default(),
            refresh_queue_size: 1000,
            refresh_interval: Duration::from_secs(1),
            worker_threads: 8,
            auth: None,
            on_unauth: None,
            namespace: None,
            stats_log_interval: None,
        }
    }

    /// Sets the hint policy.
    #[must_use]
    pub fn with_hint_policy(mut self, policy: HintPolicy) -> Self {
        self.hint_policy = policy;
        self
    }

    /// Sets the refresh queue capacity.
    #[must_use]
    pub fn with_refresh_queue_size(mut self, size: usize) -> Self {
        self.refresh_queue_size = size;
        self
    }

    /// Sets the minimum watcher period.
    #[must_use]
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Sets the number of refresh workers.
    #[must_use]
    pub fn with_worker_threads(mut self, n: usize) -> Self {
        self.worker_threads = n;
        self
    }

    /// Installs a subscription gate.
    #[must_use]
    pub fn with_auth<F>(mut self, auth: F) -> Self
    where
        F: Fn(&ViewSignature, &K, &C) -> bool + Send + Sync + 'static,
    {
        self.auth = Some(Arc::new(auth));
        self
    }

    /// Installs a refusal callback, invoked after the gate returns `false`.
    #[must_use]
    pub fn with_on_unauth<F>(mut self, on_unauth: F) -> Self
    where
        F: Fn(&ViewSignature, &K, &C) + Send + Sync + 'static,
    {
        self.on_unauth = Some(Arc::new(on_unauth));
        self
    }

    /// Installs a namespace resolver.
    #[must_use]
    pub fn with_namespace<F>(mut self, namespace: F) -> Self
    where
        F: Fn(&ViewSignature, &K, &C) -> Option<Namespace> + Send + Sync + 'static,
    {
        self.namespace = Some(Arc::new(namespace));
        self
    }

    /// Enables statistics collection with the given logging period.
    #[must_use]
    pub fn with_stats_log_interval(mut self, interval: Duration) -> Self {
        self.stats_log_interval = Some(interval);
        self
    }
}

impl<D, K, C> std::fmt::Debug for ServerConfig<D, K, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("hint_policy", &self.hint_policy)
            .field("refresh_queue_size", &self.refresh_queue_size)
            .field("refresh_interval", &self.refresh_interval)
            .field("worker_threads", &self.worker_threads)
            .field("auth", &self.auth.is_some())
            .field("on_unauth", &self.on_unauth.is_some())
            .field("namespace", &self.namespace.is_some())
            .field("stats_log_interval", &self.stats_log_interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let cfg: ServerConfig<i64, u64> = ServerConfig::new(|_, _| Ok(()));
        assert_eq!(cfg.hint_policy, HintPolicy::Immediate);
        assert_eq!(cfg.refresh_queue_size, 1000);
        assert_eq!(cfg.refresh_interval, Duration::from_secs(1));
        assert_eq!(cfg.worker_threads, 8);
        assert!(cfg.auth.is_none());
        assert!(cfg.on_unauth.is_none());
        assert!(cfg.namespace.is_none());
        assert!(cfg.stats_log_interval.is_none());
    }

    #[test]
    fn test_config_builders() {
        let cfg: ServerConfig<i64, u64, ()> = ServerConfig::new(|_, _| Ok(()))
            .with_hint_policy(HintPolicy::Batched)
            .with_refresh_queue_size(10)
            .with_refresh_interval(Duration::from_millis(50))
            .with_worker_threads(2)
            .with_auth(|_, _, _| true)
            .with_on_unauth(|_, _, _| {})
            .with_namespace(|_, _, _| None)
            .with_stats_log_interval(Duration::from_secs(5));
        assert_eq!(cfg.hint_policy, HintPolicy::Batched);
        assert_eq!(cfg.refresh_queue_size, 10);
        assert_eq!(cfg.worker_threads, 2);
        assert!(cfg.auth.is_some());
        assert!(cfg.on_unauth.is_some());
        assert!(cfg.namespace.is_some());
        assert_eq!(cfg.stats_log_interval, Some(Duration::from_secs(5)));
    }
}
