//! Cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_CAPACITY: usize = 1_000;
const DEFAULT_STALE_AFTER_SECONDS: u64 = 60;
const DEFAULT_AUTO_CONSUME_INTERVAL_MS: u64 = 5_000;
const DEFAULT_CONSUME_BATCH_LIMIT: usize = 100;
const DEFAULT_QUEUE_LIMIT: usize = 10_000;

/// Query cache configuration, the `[cache]` section of the settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serve reads from the query cache. When off every read hits the fetcher.
    pub enabled: bool,
    /// Maximum number of cached keys (LRU eviction beyond that).
    pub capacity: usize,
    /// Entries older than this are refetched on the next read.
    pub stale_after_seconds: u64,
    /// Interval of the background consumer.
    pub auto_consume_interval_ms: u64,
    /// Maximum events per consumption batch.
    pub consume_batch_limit: usize,
    /// Pending events kept before the queue overflows.
    pub queue_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
            stale_after_seconds: DEFAULT_STALE_AFTER_SECONDS,
            auto_consume_interval_ms: DEFAULT_AUTO_CONSUME_INTERVAL_MS,
            consume_batch_limit: DEFAULT_CONSUME_BATCH_LIMIT,
            queue_limit: DEFAULT_QUEUE_LIMIT,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            capacity: settings.capacity.get() as usize,
            stale_after_seconds: settings.stale_after_seconds,
            auto_consume_interval_ms: settings.auto_consume_interval_ms.get(),
            consume_batch_limit: settings.consume_batch_limit.get() as usize,
            queue_limit: settings.queue_limit.get() as usize,
        }
    }
}

impl CacheConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_seconds)
    }

    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the batch limit as NonZeroUsize, clamping to 1 if zero.
    pub fn consume_batch_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.consume_batch_limit).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the queue limit as NonZeroUsize, clamping to 1 if zero.
    pub fn queue_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.queue_limit).unwrap_or(NonZeroUsize::MIN)
    }
}
