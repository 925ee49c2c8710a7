//! The shared key-value store abstraction.
//!
//! Everything the coordination layer needs from the backing store is captured
//! here so that the production Redis client and the in-memory test store are
//! interchangeable. All mutation is through atomic single-key operations;
//! there is no multi-key transaction anywhere in this layer.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn from_backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// One page of a cursor-based key scan.
///
/// `cursor` is an opaque continuation token; `None` means the iteration is
/// complete. A page may legally be empty while the cursor is still `Some`.
#[derive(Debug, Clone)]
pub struct ScanPage {
    pub keys: Vec<String>,
    pub cursor: Option<String>,
}

/// Primitive operations over the shared store.
///
/// The store is process-external and shared across the whole fleet; the
/// atomicity of [`SharedStore::set_if_absent`] across all concurrent callers
/// (not just within one process) is what the distributed lock relies on.
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Fetch the raw value stored under `key`, `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous entry. With a TTL
    /// the entry expires automatically; without one it persists until
    /// deleted.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Remove entries unconditionally, returning how many existed. Deleting
    /// absent keys is not an error.
    async fn del(&self, keys: &[String]) -> Result<u64, StoreError>;

    /// Atomically create `key` only if no live entry exists, with a mandatory
    /// expiry. Returns whether the entry was created.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Incrementally enumerate keys matching a glob-style `pattern`,
    /// returning at most roughly `count` keys per round-trip.
    async fn scan(
        &self,
        pattern: &str,
        cursor: Option<String>,
        count: usize,
    ) -> Result<ScanPage, StoreError>;

    /// Wipe every entry in the store, across all namespaces.
    async fn flush_all(&self) -> Result<(), StoreError>;
}
