//! In-memory implementation of the shared store.
//!
//! Behaves like a single-node Redis for the subset of primitives the cache
//! layer uses: lazy per-entry expiry, atomic create-if-absent, glob scans
//! with a continuation cursor. Backs the test suite and the `memory` store
//! backend for single-process deployments.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use glob::Pattern;
use tokio::time::Instant;
use tracing::warn;

use super::store::{ScanPage, SharedStore, StoreError};

const SOURCE: &str = "cache::memory";

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| deadline > now)
    }
}

/// Mutex-protected map with Redis-like expiry semantics.
#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self, op: &'static str) -> MutexGuard<'_, HashMap<String, Entry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(
                    op,
                    target_module = SOURCE,
                    result = "poisoned_recovered",
                    "Recovered from poisoned store lock"
                );
                poisoned.into_inner()
            }
        }
    }

    fn compile(pattern: &str) -> Result<Pattern, StoreError> {
        Pattern::new(pattern)
            .map_err(|err| StoreError::from_backend(format!("invalid pattern `{pattern}`: {err}")))
    }
}

#[async_trait]
impl SharedStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let mut entries = self.lock("get");
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.lock("set").insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut entries = self.lock("del");
        let mut removed = 0;
        for key in keys {
            if let Some(entry) = entries.remove(key) {
                if entry.is_live(now) {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut entries = self.lock("set_if_absent");
        if entries.get(key).is_some_and(|entry| entry.is_live(now)) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(now + ttl),
            },
        );
        Ok(true)
    }

    async fn scan(
        &self,
        pattern: &str,
        cursor: Option<String>,
        count: usize,
    ) -> Result<ScanPage, StoreError> {
        let matcher = Self::compile(pattern)?;
        let count = count.max(1);
        let now = Instant::now();

        // The cursor is the last key returned, so the iteration stays
        // correct when matched keys are deleted between rounds.
        let entries = self.lock("scan");
        let mut matched: Vec<&String> = entries
            .iter()
            .filter(|(key, entry)| entry.is_live(now) && matcher.matches(key))
            .map(|(key, _)| key)
            .collect();
        matched.sort();

        let keys: Vec<String> = matched
            .into_iter()
            .filter(|key| cursor.as_deref().is_none_or(|last| key.as_str() > last))
            .take(count)
            .cloned()
            .collect();

        let cursor = (keys.len() == count).then(|| {
            keys.last()
                .cloned()
                .unwrap_or_default()
        });
        Ok(ScanPage { keys, cursor })
    }

    async fn flush_all(&self) -> Result<(), StoreError> {
        self.lock("flush_all").clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn set_get_roundtrip_with_expiry() {
        let store = InMemoryStore::new();
        store
            .set("k", "v", Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_without_ttl_persists() {
        let store = InMemoryStore::new();
        store.set("k", "v", None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn del_is_idempotent() {
        let store = InMemoryStore::new();
        store.set("k", "v", None).await.unwrap();
        assert_eq!(store.del(&owned(&["k"])).await.unwrap(), 1);
        assert_eq!(store.del(&owned(&["k"])).await.unwrap(), 0);
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn set_if_absent_is_exclusive_until_expiry() {
        let store = InMemoryStore::new();
        assert!(
            store
                .set_if_absent("lock", "1", Duration::from_secs(10))
                .await
                .unwrap()
        );
        assert!(
            !store
                .set_if_absent("lock", "1", Duration::from_secs(10))
                .await
                .unwrap()
        );

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(
            store
                .set_if_absent("lock", "1", Duration::from_secs(10))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn scan_pages_through_matching_keys() {
        let store = InMemoryStore::new();
        for i in 0..25 {
            store
                .set(&format!("app:item:{i:02}"), "x", None)
                .await
                .unwrap();
        }
        store.set("other:key", "x", None).await.unwrap();

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = store.scan("app:item:*", cursor, 10).await.unwrap();
            seen.extend(page.keys);
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        assert_eq!(seen.len(), 25);
        assert!(!seen.contains(&"other:key".to_string()));
    }

    #[tokio::test]
    async fn scan_survives_deletion_between_pages() {
        let store = InMemoryStore::new();
        for i in 0..20 {
            store.set(&format!("ns:{i:02}"), "x", None).await.unwrap();
        }

        let first = store.scan("ns:*", None, 8).await.unwrap();
        store.del(&first.keys).await.unwrap();
        let second = store.scan("ns:*", first.cursor, 8).await.unwrap();

        // Nothing already-returned reappears, nothing left behind is skipped.
        assert!(first.keys.iter().all(|k| !second.keys.contains(k)));
        let third = store.scan("ns:*", second.cursor, 8).await.unwrap();
        assert_eq!(first.keys.len() + second.keys.len() + third.keys.len(), 20);
    }

    #[tokio::test]
    async fn flush_all_empties_every_namespace() {
        let store = InMemoryStore::new();
        store.set("a:1", "x", None).await.unwrap();
        store.set("b:1", "x", None).await.unwrap();
        store.flush_all().await.unwrap();
        let page = store.scan("*", None, 100).await.unwrap();
        assert!(page.keys.is_empty());
    }
}
