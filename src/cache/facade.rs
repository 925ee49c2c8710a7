//! Typed JSON facade over the shared store.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use super::store::{SharedStore, StoreError};

const METRIC_CACHE_HIT: &str = "skillbridge_cache_hit_total";
const METRIC_CACHE_MISS: &str = "skillbridge_cache_miss_total";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A stored value failed to parse as JSON. Surfaced as a hard error, not
    /// a miss, so corrupt entries are noticed instead of silently recomputed.
    #[error("corrupt cache entry `{key}`: {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },
    #[error("failed to serialize value for `{key}`: {source}")]
    Serialize {
        key: String,
        source: serde_json::Error,
    },
}

/// Cache handle shared by services and the single-flight coordinator.
///
/// Holds no in-process state; every operation round-trips to the injected
/// store.
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn SharedStore>,
}

impl Cache {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn SharedStore> {
        &self.store
    }

    /// Fetch and deserialize the entry under `key`, `None` on a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let Some(raw) = self.store.get(key).await? else {
            counter!(METRIC_CACHE_MISS).increment(1);
            return Ok(None);
        };
        let value = serde_json::from_str(&raw).map_err(|source| CacheError::Corrupt {
            key: key.to_string(),
            source,
        })?;
        counter!(METRIC_CACHE_HIT).increment(1);
        Ok(Some(value))
    }

    /// Serialize `value` and store it under `key`. With a TTL the entry
    /// expires automatically; without one it persists until deleted.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let raw = serde_json::to_string(value).map_err(|source| CacheError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.store.set(key, &raw, ttl).await?;
        Ok(())
    }

    /// Remove the entry unconditionally; removing an absent key is fine.
    pub async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.store.del(std::slice::from_ref(&key.to_string())).await?;
        Ok(())
    }
}
