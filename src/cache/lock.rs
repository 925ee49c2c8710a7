//! Distributed lock entries over the shared store.
//!
//! A lock is an ordinary store entry created with the atomic
//! create-if-absent-with-expiry primitive. It always carries a TTL, so a
//! crashed holder can block others for at most the lock's lifetime.

use std::time::Duration;

use metrics::counter;
use tracing::warn;

use super::keys::lock_key;
use super::store::{SharedStore, StoreError};

const LOCK_SENTINEL: &str = "1";
const METRIC_LOCK_RELEASE_FAILURE: &str = "skillbridge_lock_release_failure_total";

/// A held lock for one business key.
///
/// Release is explicit rather than scoped because it needs the async store;
/// the single-flight coordinator calls [`LockLease::release`] on every exit
/// path, and the TTL covers the remaining crash window.
pub(crate) struct LockLease {
    key: String,
}

impl LockLease {
    /// Try to take the lock for `key`, returning `None` when another
    /// participant already holds it.
    pub(crate) async fn try_acquire(
        store: &dyn SharedStore,
        key: &str,
        ttl: Duration,
    ) -> Result<Option<Self>, StoreError> {
        let lock = lock_key(key);
        let acquired = store.set_if_absent(&lock, LOCK_SENTINEL, ttl).await?;
        Ok(acquired.then_some(Self { key: lock }))
    }

    /// Delete the lock entry. Failures are logged and swallowed: the entry
    /// self-expires, so a missed delete only widens the duplicate-work
    /// window instead of wedging other participants.
    pub(crate) async fn release(self, store: &dyn SharedStore) {
        if let Err(err) = store.del(std::slice::from_ref(&self.key)).await {
            counter!(METRIC_LOCK_RELEASE_FAILURE).increment(1);
            warn!(
                key = %self.key,
                error = %err,
                "Failed to release cache lock; waiting for TTL expiry"
            );
        }
    }
}
