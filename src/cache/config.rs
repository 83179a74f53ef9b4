//! Cache configuration.
//!
//! Controls freshness, retention and read-retry behavior. Defaults match the
//! `[cache]` defaults of the settings loader.

use std::time::Duration;

use crate::config::{
    CacheSettings, DEFAULT_DEBOUNCE_MS, DEFAULT_FRESHNESS_MS, DEFAULT_GC_INTERVAL_MS,
    DEFAULT_QUERY_RETRY_ATTEMPTS, DEFAULT_QUERY_RETRY_DELAY_MS, DEFAULT_RETENTION_MS,
};

/// Cache configuration resolved from the `[cache]` settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Age (ms) after which a successful entry counts as stale.
    pub freshness_ms: u64,
    /// Time (ms) an unsubscribed entry is retained before collection.
    pub retention_ms: u64,
    /// Interval (ms) of the background retention sweep.
    pub gc_interval_ms: u64,
    /// Extra attempts for reads that failed with a network error.
    pub query_retry_attempts: u32,
    /// Pause (ms) between read attempts.
    pub query_retry_delay_ms: u64,
    /// Quiet period (ms) for free-text search input.
    pub debounce_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            freshness_ms: DEFAULT_FRESHNESS_MS,
            retention_ms: DEFAULT_RETENTION_MS,
            gc_interval_ms: DEFAULT_GC_INTERVAL_MS,
            query_retry_attempts: DEFAULT_QUERY_RETRY_ATTEMPTS,
            query_retry_delay_ms: DEFAULT_QUERY_RETRY_DELAY_MS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            freshness_ms: duration_ms(settings.freshness),
            retention_ms: duration_ms(settings.retention),
            gc_interval_ms: duration_ms(settings.gc_interval),
            query_retry_attempts: settings.query_retry_attempts,
            query_retry_delay_ms: duration_ms(settings.query_retry_delay),
            debounce_ms: duration_ms(settings.debounce),
        }
    }
}

impl CacheConfig {
    pub fn freshness(&self) -> Duration {
        Duration::from_millis(self.freshness_ms)
    }

    /// Retention window, never shorter than the freshness window.
    pub fn retention(&self) -> Duration {
        Duration::from_millis(self.retention_ms.max(self.freshness_ms))
    }

    /// Sweep interval, clamped to at least one millisecond.
    pub fn gc_interval(&self) -> Duration {
        Duration::from_millis(self.gc_interval_ms.max(1))
    }

    pub fn query_retry_delay(&self) -> Duration {
        Duration::from_millis(self.query_retry_delay_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
