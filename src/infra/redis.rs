//! Redis-backed implementation of the shared store.
//!
//! One `ConnectionManager` per process; it multiplexes and reconnects on its
//! own, so every operation clones the handle instead of pooling.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::info;

use crate::cache::{ScanPage, SharedStore, StoreError};

pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|err| StoreError::unavailable(format!("invalid redis url: {err}")))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|err| StoreError::unavailable(format!("redis connect failed: {err}")))?;
        info!(url, "Connected to redis");
        Ok(Self { conn })
    }

    fn ttl_seconds(ttl: Duration) -> u64 {
        ttl.as_secs().max(1)
    }
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(StoreError::from_backend)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(Self::ttl_seconds(ttl));
        }
        let _: () = cmd
            .query_async(&mut conn)
            .await
            .map_err(StoreError::from_backend)?;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .map_err(StoreError::from_backend)
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        // SET NX EX replies OK on success and nil when the key exists; the
        // server guarantees atomicity across every client in the fleet.
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(Self::ttl_seconds(ttl))
            .query_async(&mut conn)
            .await
            .map_err(StoreError::from_backend)?;
        Ok(reply.is_some())
    }

    async fn scan(
        &self,
        pattern: &str,
        cursor: Option<String>,
        count: usize,
    ) -> Result<ScanPage, StoreError> {
        let mut conn = self.conn.clone();
        let raw_cursor: u64 = match cursor {
            Some(cursor) => cursor.parse().map_err(|_| {
                StoreError::from_backend(format!("invalid scan cursor `{cursor}`"))
            })?,
            None => 0,
        };
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(raw_cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count.max(1))
            .query_async(&mut conn)
            .await
            .map_err(StoreError::from_backend)?;
        Ok(ScanPage {
            keys,
            cursor: (next != 0).then(|| next.to_string()),
        })
    }

    async fn flush_all(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("FLUSHALL")
            .query_async(&mut conn)
            .await
            .map_err(StoreError::from_backend)?;
        Ok(())
    }
}
