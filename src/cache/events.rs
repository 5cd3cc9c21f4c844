//! Cache event system.
//!
//! Mutations publish events describing what changed; the consumer turns them
//! into key invalidations.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use metrics::counter;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::lock::mutex_lock;

const SOURCE: &str = "cache::events";
pub const METRIC_EVENTS_DROPPED: &str = "hymnary_cache_events_dropped_total";

/// Monotonic epoch for ordering events within this process.
pub type Epoch = u64;

#[derive(Debug, Clone)]
pub struct CacheEvent {
    /// Unique identifier for idempotency.
    pub id: Uuid,
    pub epoch: Epoch,
    pub kind: EventKind,
    pub timestamp: OffsetDateTime,
}

impl CacheEvent {
    pub fn new(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Every mutation that can make a cached read out of date.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    // Catalog
    HymnUpserted { id: Uuid },
    HymnDeleted { id: Uuid },
    HymnStatusChanged { id: Uuid },
    HymnViewed { id: Uuid },
    AuthorUpserted { id: Uuid },
    AuthorDeleted { id: Uuid },
    CategoryUpserted { id: Uuid },
    CategoryDeleted { id: Uuid },

    // Per-user state
    FavoriteToggled { user_id: Uuid, hymn_id: Uuid },
    NotificationsChanged { user_id: Uuid },
    NotificationsBroadcast,
    ProfileUpdated { user_id: Uuid },

    // Forum
    ForumPostUpserted { id: Uuid },
    ForumPostDeleted { id: Uuid },
    ForumCommentAdded { post_id: Uuid },
    ForumCommentDeleted { post_id: Uuid },
    ForumPostLiked { post_id: Uuid },
    ForumPostViewed { id: Uuid },
    ForumCommentLiked { post_id: Uuid },
    BookmarkToggled { user_id: Uuid, post_id: Uuid },

    // Administration
    UserRoleChanged { user_id: Uuid },
    UserDeleted { user_id: Uuid },
    ReportChanged { id: Uuid },
}

/// In-memory event queue.
///
/// Bounded: when full the oldest event is dropped and the queue remembers
/// that it overflowed, so the next consumption can fall back to a full flush.
pub struct EventQueue {
    queue: Mutex<VecDeque<CacheEvent>>,
    epoch_counter: AtomicU64,
    limit: usize,
    overflowed: AtomicBool,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::with_limit(usize::MAX)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            epoch_counter: AtomicU64::new(0),
            limit: limit.max(1),
            overflowed: AtomicBool::new(false),
        }
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    pub fn publish(&self, kind: EventKind) -> Epoch {
        let epoch = self.next_epoch();
        let event = CacheEvent::new(kind, epoch);

        info!(
            target: "hymnary::cache",
            event_id = %event.id,
            event_epoch = event.epoch,
            event_kind = ?event.kind,
            "Cache event enqueued"
        );

        let mut queue = mutex_lock(&self.queue, SOURCE, "publish");
        if queue.len() >= self.limit {
            if let Some(dropped) = queue.pop_front() {
                warn!(
                    target: "hymnary::cache",
                    event_id = %dropped.id,
                    limit = self.limit,
                    "Cache event queue full, dropping oldest event"
                );
            }
            self.overflowed.store(true, Ordering::SeqCst);
            counter!(METRIC_EVENTS_DROPPED).increment(1);
        }
        queue.push_back(event);
        epoch
    }

    /// Drains up to `limit` events in FIFO order.
    pub fn drain(&self, limit: usize) -> Vec<CacheEvent> {
        let mut queue = mutex_lock(&self.queue, SOURCE, "drain");
        let count = limit.min(queue.len());
        queue.drain(..count).collect()
    }

    /// Returns and clears the overflow flag.
    pub fn take_overflow(&self) -> bool {
        self.overflowed.swap(false, Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    #[test]
    fn publish_returns_increasing_epochs() {
        let queue = EventQueue::new();
        let first = queue.publish(EventKind::NotificationsBroadcast);
        let second = queue.publish(EventKind::NotificationsBroadcast);
        assert!(first < second);
    }

    #[test]
    fn drain_is_fifo_and_bounded() {
        let queue = EventQueue::new();
        let id = Uuid::new_v4();

        queue.publish(EventKind::HymnUpserted { id });
        queue.publish(EventKind::HymnStatusChanged { id });
        queue.publish(EventKind::HymnDeleted { id });

        let events = queue.drain(2);
        assert_eq!(events.len(), 2);
        assert_eq!(queue.len(), 1);
        assert_eq!(events[0].kind, EventKind::HymnUpserted { id });
        assert_eq!(events[1].kind, EventKind::HymnStatusChanged { id });

        assert_eq!(queue.drain(100).len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn full_queue_drops_oldest_and_flags_overflow() {
        let queue = EventQueue::with_limit(2);
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            queue.publish(EventKind::ReportChanged { id: *id });
        }

        let events = queue.drain(10);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::ReportChanged { id: ids[1] });
        assert!(queue.take_overflow());
        assert!(!queue.take_overflow());
    }

    #[test]
    fn event_queue_recovers_from_poisoned_lock() {
        let queue = EventQueue::new();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = queue.queue.lock().expect("queue lock should be acquired");
            panic!("poison queue lock");
        }));

        queue.publish(EventKind::NotificationsBroadcast);
        assert_eq!(queue.len(), 1);
    }
}
