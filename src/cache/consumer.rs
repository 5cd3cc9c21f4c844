//! Cache consumer.
//!
//! Drains events, plans the invalidation, and applies it to the query client.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::client::QueryClient;
use super::config::CacheConfig;
use super::events::EventQueue;
use super::planner::InvalidationPlan;

pub const METRIC_CACHE_CONSUME_MS: &str = "hymnary_cache_consume_ms";
pub const METRIC_CACHE_EVENTS_CONSUMED: &str = "hymnary_cache_events_consumed_total";

pub struct CacheConsumer {
    config: CacheConfig,
    client: Arc<QueryClient>,
    queue: Arc<EventQueue>,
}

impl CacheConsumer {
    pub fn new(config: CacheConfig, client: Arc<QueryClient>, queue: Arc<EventQueue>) -> Self {
        Self {
            config,
            client,
            queue,
        }
    }

    /// Consumes one batch of the configured size. Returns true if anything
    /// was processed.
    pub fn consume(&self) -> bool {
        self.consume_up_to(self.config.consume_batch_limit_non_zero().get())
    }

    #[instrument(skip(self), target = "hymnary::cache")]
    pub fn consume_up_to(&self, limit: usize) -> bool {
        let started_at = Instant::now();
        let overflowed = self.queue.take_overflow();
        let events = self.queue.drain(limit);
        if events.is_empty() && !overflowed {
            return false;
        }

        let event_count = events.len();
        let event_ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        let plan = if overflowed {
            warn!(
                target: "hymnary::cache",
                "Cache events were dropped, flushing every cached query"
            );
            InvalidationPlan::flush_all()
        } else {
            InvalidationPlan::from_events(events)
        };

        info!(
            target: "hymnary::cache",
            event_count,
            event_ids = ?event_ids,
            plan = %plan,
            "Cache consumption starting"
        );

        let invalidated = if plan.flush_all {
            self.client.clear()
        } else {
            plan.prefixes
                .iter()
                .map(|prefix| self.client.invalidate(prefix))
                .sum()
        };

        info!(
            target: "hymnary::cache",
            event_count,
            invalidated,
            "Cache consumption complete"
        );

        counter!(METRIC_CACHE_EVENTS_CONSUMED).increment(event_count as u64);
        histogram!(METRIC_CACHE_CONSUME_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        true
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn client(&self) -> &Arc<QueryClient> {
        &self.client
    }
}
