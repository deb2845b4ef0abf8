//! # viewcast
//!
//! Server-side view subscription and refresh engine. Subscribers attach to
//! named, parameterized queries ("views") and receive a fresh copy of the
//! view's data whenever the underlying data changes.
//!
//! ## Architecture
//!
//! ```text
//!  writers ──put_hints──► hint set ──► watcher ──relevant?──► refresh queue
//!                             (batched)   │                    (bounded,
//!                (immediate policy skips the set and runs       dedup)
//!                 the relevance pass on the caller thread)        │
//!                                                                 ▼
//!  subscribers ◄──send_fn── workers: view.data → hash → changed-only fan-out
//! ```
//!
//! Change hints are opaque to the engine: registered [`View`] providers
//! decide relevance and compute data. Workers suppress deliveries whose data
//! hash matches the last value sent, so idempotent hints cost one recompute
//! and zero sends. The bounded refresh queue is the only backpressure
//! mechanism; overflow drops the newest signature and the next relevant
//! hint re-enqueues it.
//!
//! ## Key Components
//!
//! - [`ViewServer`] — lifecycle and API surface (subscribe, unsubscribe,
//!   put_hints, add_views, shutdown)
//! - [`ViewRegistry`](registry::ViewRegistry) — view id → provider map
//! - [`SubscriptionIndex`](index::SubscriptionIndex) — bidirectional
//!   subscriber/signature index owning the hash cache
//! - [`HintSet`](hints::HintSet) — deduplicated pending invalidations
//! - [`RefreshQueue`](queue::RefreshQueue) — bounded deduplicating FIFO of
//!   signatures awaiting recomputation
//!
//! ## Example
//!
//! ```rust,ignore
//! use viewcast::{Hint, ServerConfig, ViewServer, ViewSignature};
//!
//! let config = ServerConfig::new(|subscriber, update| {
//!     transport.send(subscriber, update)
//! });
//! let server = ViewServer::start(config, views)?;
//!
//! server.subscribe(ViewSignature::with_namespace("tenant-1", "orders", vec![]), conn_id, &session)?;
//! server.put_hints(vec![Hint::new("tenant-1", vec!["orders".into()], "sql")]);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod hints;
pub mod index;
pub mod queue;
pub mod registry;
pub mod server;
pub mod signal;
pub mod stats;
pub mod view;

mod watcher;
mod worker;

pub use config::{AuthFn, HintPolicy, NamespaceFn, OnUnauthFn, SendFn, ServerConfig};
pub use error::{BoxError, RefreshError, SpawnError, SubscribeError};
pub use server::{InitialRefresh, ViewServer};
pub use stats::StatsSnapshot;
pub use view::{Hint, HintKind, Namespace, Scalar, View, ViewId, ViewSignature, ViewUpdate};
