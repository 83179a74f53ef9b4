use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};
use crate::{cache, mutation, query};

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

/// Register descriptions for every metric the sync core records.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            cache::METRIC_CACHE_HIT,
            Unit::Count,
            "Total number of cache reads that found data."
        );
        describe_counter!(
            cache::METRIC_CACHE_MISS,
            Unit::Count,
            "Total number of cache reads without data."
        );
        describe_gauge!(
            cache::METRIC_CACHE_ENTRIES,
            Unit::Count,
            "Current number of cache entries."
        );
        describe_counter!(
            cache::METRIC_CACHE_GC_EVICT,
            Unit::Count,
            "Total number of entries collected after their retention window."
        );
        describe_counter!(
            query::METRIC_QUERY_FETCH,
            Unit::Count,
            "Total number of fetches started against the remote API."
        );
        describe_histogram!(
            query::METRIC_QUERY_FETCH_MS,
            Unit::Milliseconds,
            "Fetch latency in milliseconds, retries included."
        );
        describe_counter!(
            query::METRIC_QUERY_DEDUP,
            Unit::Count,
            "Total number of fetch requests that joined an in-flight fetch."
        );
        describe_counter!(
            query::METRIC_QUERY_ERROR,
            Unit::Count,
            "Total number of failed fetches."
        );
        describe_counter!(
            query::METRIC_INVALIDATION,
            Unit::Count,
            "Total number of prefix invalidations."
        );
        describe_counter!(
            mutation::METRIC_MUTATION,
            Unit::Count,
            "Total number of mutations sent."
        );
        describe_counter!(
            mutation::METRIC_MUTATION_ERROR,
            Unit::Count,
            "Total number of mutations rejected or failed."
        );
    });
}
