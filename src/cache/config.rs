//! Cache coordination tuning.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_FOLLOWER_POLL_ATTEMPTS: u32 = 20;
const DEFAULT_FOLLOWER_POLL_INTERVAL_MS: u64 = 100;
const DEFAULT_LOCK_TTL_SECONDS: u64 = 10;
const DEFAULT_PURGE_BATCH: usize = 1000;

/// Knobs for the single-flight coordinator and the administrator.
///
/// The follower budget (attempts x interval) bounds how long a participant
/// waits for the leader before recomputing on its own. Raising it trades a
/// narrower duplicate-work window for worse liveness under a crashed leader;
/// the defaults give roughly two seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheTuning {
    /// How many times a follower polls the cache before recomputing.
    pub follower_poll_attempts: u32,
    /// Pause between follower polls, in milliseconds.
    pub follower_poll_interval_ms: u64,
    /// Default lifetime of lock entries, in seconds.
    pub lock_ttl_seconds: u64,
    /// Keys requested per scan round-trip during pattern purges.
    pub purge_batch: usize,
}

impl Default for CacheTuning {
    fn default() -> Self {
        Self {
            follower_poll_attempts: DEFAULT_FOLLOWER_POLL_ATTEMPTS,
            follower_poll_interval_ms: DEFAULT_FOLLOWER_POLL_INTERVAL_MS,
            lock_ttl_seconds: DEFAULT_LOCK_TTL_SECONDS,
            purge_batch: DEFAULT_PURGE_BATCH,
        }
    }
}

impl CacheTuning {
    pub fn follower_poll_interval(&self) -> Duration {
        Duration::from_millis(self.follower_poll_interval_ms.max(1))
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_seconds.max(1))
    }

    pub fn purge_batch_non_zero(&self) -> usize {
        self.purge_batch.max(1)
    }
}
