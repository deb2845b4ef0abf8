//! Refresh worker loop.
//!
//! Each worker pops a signature from the refresh queue, recomputes the view
//! data, and fans it out to the signature's subscribers — unless the data
//! hash matches the last one sent, in which case nothing is delivered.
//! Provider and send failures are logged and swallowed; nothing here kills
//! a worker. The poll timeout exists so a quiet worker still observes the
//! shutdown flag.

use std::fmt;
use std::hash::Hash;
use std::time::Duration;

use tracing::{error, warn};

use crate::index::hash_data;
use crate::server::Shared;
use crate::view::{ViewSignature, ViewUpdate};

/// How long a worker blocks on the queue before re-checking shutdown.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(60);

/// Worker loop body; runs until shutdown.
pub fn run<D, K, C>(shared: &Shared<D, K, C>)
where
    D: Hash,
    K: Clone + Eq + Hash + fmt::Debug,
{
    while !shared.shutdown.is_stopped() {
        let Some(sig) = shared.queue.poll(POLL_TIMEOUT) else {
            continue;
        };
        shared.stats.record_refresh();
        refresh(shared, &sig);
    }
}

/// Recomputes one signature and conditionally fans out.
fn refresh<D, K, C>(shared: &Shared<D, K, C>, sig: &ViewSignature)
where
    D: Hash,
    K: Clone + Eq + Hash + fmt::Debug,
{
    let Some(view) = shared.registry.get(&sig.view_id) else {
        warn!(sig = %sig, "refresh: view missing from registry");
        return;
    };

    let data = match view.data(sig.namespace.as_ref(), &sig.parameters) {
        Ok(data) => data,
        Err(e) => {
            error!(sig = %sig, error = %e, "refresh: view provider failed");
            return;
        }
    };
    let hash = hash_data(&data);

    // Snapshot subscribers and the cached hash together. Subscribers that
    // arrive after this point get the value from their own initial refresh.
    let Some(target) = shared.index.refresh_target(sig) else {
        return;
    };
    if target.last_hash == Some(hash) {
        return;
    }

    let update = ViewUpdate {
        view_id: sig.view_id.clone(),
        parameters: sig.parameters.clone(),
        data,
    };
    for key in &target.subscribers {
        if let Err(e) = (shared.config.send)(key, &update) {
            error!(sig = %sig, subscriber = ?key, error = %e, "refresh: send failed");
        }
    }
    shared.index.store_hash(sig, hash);
}
