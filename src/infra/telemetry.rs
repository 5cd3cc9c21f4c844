use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::{
    METRIC_CACHE_CONSUME_MS, METRIC_CACHE_EVENTS_CONSUMED, METRIC_DEDUP, METRIC_EVENTS_DROPPED,
    METRIC_FETCH_ERROR, METRIC_FETCH_MS, METRIC_HIT, METRIC_INVALIDATED, METRIC_MISS,
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
        describe_counter!(METRIC_HIT, Unit::Count, "Query cache reads served from a fresh entry.");
        describe_counter!(
            METRIC_MISS,
            Unit::Count,
            "Query cache reads that had to run the fetcher."
        );
        describe_counter!(
            METRIC_DEDUP,
            Unit::Count,
            "Query cache reads that joined an in-flight fetch."
        );
        describe_counter!(
            METRIC_FETCH_ERROR,
            Unit::Count,
            "Fetches that failed, with or without stale data to fall back on."
        );
        describe_counter!(
            METRIC_INVALIDATED,
            Unit::Count,
            "Query cache entries marked stale by invalidation."
        );
        describe_histogram!(
            METRIC_FETCH_MS,
            Unit::Milliseconds,
            "Fetcher latency in milliseconds."
        );
        describe_counter!(
            METRIC_CACHE_EVENTS_CONSUMED,
            Unit::Count,
            "Cache events applied by the consumer."
        );
        describe_counter!(
            METRIC_EVENTS_DROPPED,
            Unit::Count,
            "Cache events dropped due to queue overflow."
        );
        describe_histogram!(
            METRIC_CACHE_CONSUME_MS,
            Unit::Milliseconds,
            "Cache consumer batch latency in milliseconds."
        );
    });
}
