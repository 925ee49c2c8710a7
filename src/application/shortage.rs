//! Shortage queries: cache-aside with single-flight protection.
//!
//! The cache key depends only on the validated 4-digit prefix, so every code
//! in the same ANZSCO group shares one entry. Entries live for 12 hours; the
//! underlying extract is refreshed daily.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::{Cache, SingleFlight, keys};
use crate::domain::AnzscoCode;

use super::error::AppError;
use super::sources::{ShortageSections, ShortageSource};

const SHORTAGE_TTL: Duration = Duration::from_secs(12 * 60 * 60);
const MAX_PREWARM_CONCURRENCY: usize = 8;

/// Full response for one shortage lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortageReport {
    pub query: ShortageQuery,
    #[serde(flatten)]
    pub sections: ShortageSections,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortageQuery {
    pub input_code: String,
    pub match_prefix4: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrewarmOptions {
    /// Override the cache TTL, in seconds.
    pub ttl_seconds: Option<u64>,
    /// Concurrent prefixes in flight, clamped to 1..=8.
    pub concurrency: Option<usize>,
    /// List the work without writing anything.
    pub dry_run: bool,
    /// Skip prefixes whose cache entry is still live.
    pub only_miss: bool,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct PrewarmSummary {
    pub total: usize,
    pub written: usize,
    pub skipped_hit: usize,
    pub skipped_dry_run: usize,
    pub failed: usize,
}

pub struct ShortageService {
    cache: Cache,
    single_flight: SingleFlight,
    source: Arc<dyn ShortageSource>,
}

impl ShortageService {
    pub fn new(cache: Cache, single_flight: SingleFlight, source: Arc<dyn ShortageSource>) -> Self {
        Self {
            cache,
            single_flight,
            source,
        }
    }

    /// Look up shortage data for a 4-6 digit ANZSCO code, matching by its
    /// first four digits.
    pub async fn by_code(&self, raw_code: &str) -> Result<ShortageReport, AppError> {
        let code = AnzscoCode::parse(raw_code)?;
        let key = keys::shortage_key(code.prefix4());

        if let Some(hit) = self.cache.get::<ShortageReport>(&key).await? {
            return Ok(hit);
        }

        let source = self.source.clone();
        let query = ShortageQuery {
            input_code: code.as_str().to_string(),
            match_prefix4: code.prefix4().to_string(),
        };
        let report = self
            .single_flight
            .run(&key, SHORTAGE_TTL, || async move {
                let sections = source.sections(&query.match_prefix4).await?;
                Ok::<_, super::sources::SourceError>(ShortageReport { query, sections })
            })
            .await?;
        Ok(report)
    }

    /// Warm the cache for every known prefix, with bounded concurrency.
    ///
    /// Individual prefix failures are logged and counted rather than
    /// aborting the batch.
    pub async fn prewarm(&self, options: PrewarmOptions) -> Result<PrewarmSummary, AppError> {
        let ttl = options
            .ttl_seconds
            .map(Duration::from_secs)
            .unwrap_or(SHORTAGE_TTL);
        let concurrency = options
            .concurrency
            .unwrap_or(4)
            .clamp(1, MAX_PREWARM_CONCURRENCY);

        let mut prefixes = self.source.distinct_prefixes().await?;
        prefixes.retain(|p| p.len() == 4 && p.bytes().all(|b| b.is_ascii_digit()));
        prefixes.sort();

        let mut summary = PrewarmSummary {
            total: prefixes.len(),
            ..Default::default()
        };

        let outcomes: Vec<PrewarmOutcome> = futures::stream::iter(prefixes)
            .map(|prefix| self.warm_one(prefix, ttl, options.dry_run, options.only_miss))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                PrewarmOutcome::Written => summary.written += 1,
                PrewarmOutcome::SkippedHit => summary.skipped_hit += 1,
                PrewarmOutcome::SkippedDryRun => summary.skipped_dry_run += 1,
                PrewarmOutcome::Failed => summary.failed += 1,
            }
        }
        Ok(summary)
    }

    async fn warm_one(
        &self,
        prefix: String,
        ttl: Duration,
        dry_run: bool,
        only_miss: bool,
    ) -> PrewarmOutcome {
        let key = keys::shortage_key(&prefix);

        if only_miss {
            match self.cache.get::<ShortageReport>(&key).await {
                Ok(Some(_)) => return PrewarmOutcome::SkippedHit,
                Ok(None) => {}
                Err(err) => {
                    warn!(prefix = %prefix, error = %err, "Prewarm cache check failed");
                    return PrewarmOutcome::Failed;
                }
            }
        }
        if dry_run {
            return PrewarmOutcome::SkippedDryRun;
        }

        let source = self.source.clone();
        let query_prefix = prefix.clone();
        let result = self
            .single_flight
            .run(&key, ttl, || async move {
                let sections = source.sections(&query_prefix).await?;
                Ok::<_, super::sources::SourceError>(ShortageReport {
                    query: ShortageQuery {
                        input_code: query_prefix.clone(),
                        match_prefix4: query_prefix,
                    },
                    sections,
                })
            })
            .await;

        match result {
            Ok(_) => PrewarmOutcome::Written,
            Err(err) => {
                warn!(prefix = %prefix, error = %err, "Prewarm failed for prefix");
                PrewarmOutcome::Failed
            }
        }
    }
}

enum PrewarmOutcome {
    Written,
    SkippedHit,
    SkippedDryRun,
    Failed,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use time::macros::datetime;

    use crate::cache::{CacheTuning, InMemoryStore, SharedStore};

    use super::super::sources::{SourceError, StateLatest};
    use super::*;

    struct FakeShortageSource {
        calls: AtomicUsize,
        prefixes: Vec<String>,
    }

    impl FakeShortageSource {
        fn new(prefixes: &[&str]) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl ShortageSource for FakeShortageSource {
        async fn sections(&self, prefix4: &str) -> Result<ShortageSections, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ShortageSections {
                latest_by_state: vec![StateLatest {
                    state: format!("State for {prefix4}"),
                    date: datetime!(2025-08-14 14:00 UTC),
                    nsc_emp: 1332.0,
                }],
                stats_by_state: vec![],
                yearly_trend: vec![],
            })
        }

        async fn distinct_prefixes(&self) -> Result<Vec<String>, SourceError> {
            Ok(self.prefixes.clone())
        }
    }

    fn service(source: Arc<FakeShortageSource>) -> ShortageService {
        let store: Arc<dyn SharedStore> = Arc::new(InMemoryStore::new());
        let cache = Cache::new(store);
        let single_flight = SingleFlight::new(cache.clone(), CacheTuning::default());
        ShortageService::new(cache, single_flight, source)
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let source = Arc::new(FakeShortageSource::new(&[]));
        let service = service(source.clone());

        let first = service.by_code("261313").await.unwrap();
        assert_eq!(first.query.match_prefix4, "2613");
        assert_eq!(first.query.input_code, "261313");

        let second = service.by_code("261399").await.unwrap();
        // Same 4-digit group, so the cached report (including the original
        // query metadata) is returned untouched.
        assert_eq!(second, first);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_code_is_rejected_before_touching_anything() {
        let source = Arc::new(FakeShortageSource::new(&[]));
        let service = service(source.clone());

        assert!(service.by_code("12a4").await.is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn prewarm_dry_run_writes_nothing() {
        let source = Arc::new(FakeShortageSource::new(&["1111", "2222", "bad!"]));
        let service = service(source.clone());

        let summary = service
            .prewarm(PrewarmOptions {
                dry_run: true,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.skipped_dry_run, 2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn prewarm_only_miss_skips_live_entries() {
        let source = Arc::new(FakeShortageSource::new(&["1111", "2222"]));
        let service = service(source.clone());

        service.by_code("1111").await.unwrap();

        let summary = service
            .prewarm(PrewarmOptions {
                only_miss: true,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.skipped_hit, 1);
        assert_eq!(summary.written, 1);
        assert_eq!(summary.failed, 0);
    }
}
