//! Bulk cache maintenance.
//!
//! These operations exist for operators, not request handling. `flush_all`
//! in particular wipes the entire shared store, including anything other
//! subsystems keep in it.

use std::sync::Arc;

use metrics::counter;
use tracing::{info, warn};

use super::store::{SharedStore, StoreError};

const METRIC_PURGE_DELETED: &str = "skillbridge_cache_purge_deleted_total";

/// Administrative operations over the shared store.
#[derive(Clone)]
pub struct CacheAdmin {
    store: Arc<dyn SharedStore>,
}

impl CacheAdmin {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    /// Delete every key matching the glob `pattern`, scanning in batches of
    /// roughly `batch` keys per round-trip so large keyspaces never block
    /// the store on one long call. Returns the number of keys deleted.
    pub async fn del_by_pattern(&self, pattern: &str, batch: usize) -> Result<u64, StoreError> {
        let batch = batch.max(1);
        let mut deleted = 0;
        let mut cursor = None;

        loop {
            let page = self.store.scan(pattern, cursor, batch).await?;
            if !page.keys.is_empty() {
                deleted += self.store.del(&page.keys).await?;
            }
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        counter!(METRIC_PURGE_DELETED).increment(deleted);
        info!(pattern, deleted, "Cache purge completed");
        Ok(deleted)
    }

    /// Wipe every entry in the store, without namespace filtering.
    pub async fn flush_all(&self) -> Result<(), StoreError> {
        warn!("Flushing the entire shared store, including entries owned by other subsystems");
        self.store.flush_all().await
    }
}
