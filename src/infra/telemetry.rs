use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "skillbridge_cache_hit_total",
            Unit::Count,
            "Total number of cache hits."
        );
        describe_counter!(
            "skillbridge_cache_miss_total",
            Unit::Count,
            "Total number of cache misses."
        );
        describe_counter!(
            "skillbridge_single_flight_leader_total",
            Unit::Count,
            "Times a participant won the recomputation lock."
        );
        describe_counter!(
            "skillbridge_single_flight_follower_hit_total",
            Unit::Count,
            "Times a follower received the leader's published result."
        );
        describe_counter!(
            "skillbridge_single_flight_fallback_total",
            Unit::Count,
            "Times a follower exhausted its poll budget and recomputed."
        );
        describe_counter!(
            "skillbridge_lock_release_failure_total",
            Unit::Count,
            "Lock deletions that failed and were left to TTL expiry."
        );
        describe_counter!(
            "skillbridge_cache_purge_deleted_total",
            Unit::Count,
            "Keys removed by administrative pattern purges."
        );
    });
}
