//! Query cache.
//!
//! Reads go through [`QueryClient::fetch`] with a [`QueryKey`]; writes
//! announce what they changed through [`CacheTrigger`], and the consumer
//! marks every dependent key stale so the next read refetches.
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 1000
//! stale_after_seconds = 60
//! # ... see config.rs for all options
//! ```

mod client;
mod config;
mod consumer;
mod events;
mod keys;
mod lock;
mod planner;
mod store;
mod trigger;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

pub use client::{
    Loaded, METRIC_DEDUP, METRIC_FETCH_ERROR, METRIC_FETCH_MS, METRIC_HIT, METRIC_INVALIDATED,
    METRIC_MISS, QueryClient, QueryError, QueryState,
};
pub use config::CacheConfig;
pub use consumer::{CacheConsumer, METRIC_CACHE_CONSUME_MS, METRIC_CACHE_EVENTS_CONSUMED};
pub use events::{CacheEvent, Epoch, EventKind, EventQueue, METRIC_EVENTS_DROPPED};
pub use keys::{QueryKey, Resource};
pub use planner::{InvalidationPlan, dependent_prefixes};
pub use store::FetchStatus;
pub use trigger::CacheTrigger;

/// The client and trigger wired to the same queue.
#[derive(Clone)]
pub struct QueryCache {
    pub client: Arc<QueryClient>,
    pub trigger: Arc<CacheTrigger>,
}

impl QueryCache {
    pub fn new(config: CacheConfig) -> Self {
        let client = Arc::new(QueryClient::new(config.clone()));
        let queue = Arc::new(EventQueue::with_limit(config.queue_limit_non_zero().get()));
        let consumer = Arc::new(CacheConsumer::new(
            config.clone(),
            client.clone(),
            queue.clone(),
        ));
        let trigger = Arc::new(CacheTrigger::new(config, queue, consumer));
        Self { client, trigger }
    }

    /// Starts the background consumer. Returns `None` when caching is off.
    pub fn spawn_auto_consume(&self) -> Option<JoinHandle<()>> {
        if !self.trigger.config().is_enabled() {
            return None;
        }
        let trigger = self.trigger.clone();
        let interval_ms = trigger.config().auto_consume_interval_ms.max(1);
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
            interval.tick().await;
            loop {
                interval.tick().await;
                trigger.consumer().consume();
            }
        }))
    }
}
