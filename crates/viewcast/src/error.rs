//! Error types.
//!
//! The engine is deliberately hard to kill: provider and send failures are
//! logged and swallowed at the refresh that observed them. The only errors
//! that reach callers are the ones the caller can act on — subscribing to an
//! unknown view, a failed thread spawn, and the completion state of an
//! initial refresh.

use crate::view::ViewId;

/// Opaque error produced by external collaborators (view providers and the
/// send callback).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure to spawn an engine thread.
#[derive(Debug, thiserror::Error)]
#[error("failed to spawn thread '{thread}': {source}")]
pub struct SpawnError {
    /// Name of the thread that could not be spawned.
    pub thread: String,
    /// Underlying OS error.
    #[source]
    pub source: std::io::Error,
}

/// Errors returned directly from `subscribe`.
#[derive(Debug, thiserror::Error)]
pub enum SubscribeError {
    /// The signature names a view that is not in the registry.
    #[error("unknown view '{0}'")]
    UnknownView(ViewId),

    /// The initial-refresh thread could not be spawned.
    #[error(transparent)]
    Spawn(#[from] SpawnError),
}

/// Outcome of an asynchronous initial refresh, surfaced through
/// [`InitialRefresh::wait`](crate::InitialRefresh::wait).
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    /// The view provider failed to compute data.
    #[error("view provider failed: {0}")]
    Provider(BoxError),

    /// The send callback failed.
    #[error("send callback failed: {0}")]
    Send(BoxError),

    /// The initial-refresh thread panicked.
    #[error("initial refresh task panicked")]
    Panicked,
}
