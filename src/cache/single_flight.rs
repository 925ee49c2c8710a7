//! Distributed single-flight recomputation.
//!
//! When a popular cache entry expires, every server process in the fleet can
//! miss at once and stampede the relational store with the same expensive
//! aggregation. The coordinator elects one leader per key through an atomic
//! create-if-absent lock entry; everyone else polls the cache for the
//! leader's published result.
//!
//! The follower wait is deliberately bounded: after `follower_poll_attempts`
//! polls the follower recomputes the value itself and writes it back. A
//! crashed or abnormally slow leader therefore can never block followers
//! indefinitely, at the cost of a known duplicate-work window in exactly
//! that situation. The last write wins and both writes carry the same TTL,
//! so staleness characteristics do not change.

use std::future::Future;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use super::config::CacheTuning;
use super::facade::{Cache, CacheError};
use super::lock::LockLease;

const METRIC_LEADER: &str = "skillbridge_single_flight_leader_total";
const METRIC_FOLLOWER_HIT: &str = "skillbridge_single_flight_follower_hit_total";
const METRIC_FALLBACK: &str = "skillbridge_single_flight_fallback_total";

#[derive(Debug, Error)]
pub enum SingleFlightError<E> {
    /// The caller-supplied computation failed. Propagated unchanged to the
    /// participant that ran it; never written to the cache.
    #[error("worker failed: {0}")]
    Worker(E),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Coordinates recomputation of expensive cache entries across the fleet.
#[derive(Clone)]
pub struct SingleFlight {
    cache: Cache,
    tuning: CacheTuning,
}

impl SingleFlight {
    pub fn new(cache: Cache, tuning: CacheTuning) -> Self {
        Self { cache, tuning }
    }

    /// Run `worker` under single-flight coordination for `key`, using the
    /// configured default lock TTL.
    pub async fn run<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        worker: F,
    ) -> Result<T, SingleFlightError<E>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_with_lock_ttl(key, ttl, self.tuning.lock_ttl(), worker)
            .await
    }

    /// Like [`SingleFlight::run`] with an explicit lock TTL, for workers
    /// whose runtime is known to exceed the default.
    pub async fn run_with_lock_ttl<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        lock_ttl: Duration,
        worker: F,
    ) -> Result<T, SingleFlightError<E>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let store = self.cache.store().as_ref();
        match LockLease::try_acquire(store, key, lock_ttl)
            .await
            .map_err(CacheError::from)?
        {
            Some(lease) => {
                counter!(METRIC_LEADER).increment(1);
                debug!(key, "single-flight leader computing");

                let outcome = worker().await;
                let publish = match &outcome {
                    Ok(value) => self.cache.set(key, value, Some(ttl)).await,
                    // A failed computation must not poison the cache.
                    Err(_) => Ok(()),
                };
                // Release on every exit path, including worker failure, so a
                // failed computation does not hold the lock for its full TTL.
                lease.release(self.cache.store().as_ref()).await;

                match outcome {
                    Ok(value) => {
                        publish?;
                        Ok(value)
                    }
                    Err(err) => Err(SingleFlightError::Worker(err)),
                }
            }
            None => self.follow(key, ttl, worker).await,
        }
    }

    /// Follower path: poll for the leader's result, then recompute after the
    /// bounded wait is exhausted.
    async fn follow<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        worker: F,
    ) -> Result<T, SingleFlightError<E>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let interval = self.tuning.follower_poll_interval();
        for _ in 0..self.tuning.follower_poll_attempts {
            if let Some(value) = self.cache.get(key).await? {
                counter!(METRIC_FOLLOWER_HIT).increment(1);
                return Ok(value);
            }
            tokio::time::sleep(interval).await;
        }

        counter!(METRIC_FALLBACK).increment(1);
        debug!(key, "single-flight follower budget exhausted, recomputing");
        let value = worker().await.map_err(SingleFlightError::Worker)?;
        self.cache.set(key, &value, Some(ttl)).await?;
        Ok(value)
    }
}
