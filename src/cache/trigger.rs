//! Cache trigger service.
//!
//! The entry point write paths use to announce what they changed.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::config::CacheConfig;
use super::consumer::CacheConsumer;
use super::events::{EventKind, EventQueue};

/// Publishes cache events and, for most mutations, consumes them right away
/// so the next read from the same client refetches.
///
/// ```ignore
/// // after a successful status change:
/// trigger.hymn_status_changed(hymn.id);
/// ```
pub struct CacheTrigger {
    config: CacheConfig,
    queue: Arc<EventQueue>,
    consumer: Arc<CacheConsumer>,
}

impl CacheTrigger {
    pub fn new(config: CacheConfig, queue: Arc<EventQueue>, consumer: Arc<CacheConsumer>) -> Self {
        Self {
            config,
            queue,
            consumer,
        }
    }

    /// Publishes an event; with `consume_now` the queue is drained
    /// immediately instead of waiting for the background consumer.
    pub fn trigger(&self, kind: EventKind, consume_now: bool) {
        if !self.config.is_enabled() {
            debug!(target: "hymnary::cache", event_kind = ?kind, "Cache trigger skipped: cache disabled");
            return;
        }

        self.queue.publish(kind);

        if consume_now {
            self.consumer.consume();
        }
    }

    pub fn hymn_upserted(&self, id: Uuid) {
        self.trigger(EventKind::HymnUpserted { id }, true);
    }

    pub fn hymn_deleted(&self, id: Uuid) {
        self.trigger(EventKind::HymnDeleted { id }, true);
    }

    pub fn hymn_status_changed(&self, id: Uuid) {
        self.trigger(EventKind::HymnStatusChanged { id }, true);
    }

    /// Views are frequent; they are left to the background consumer.
    pub fn hymn_viewed(&self, id: Uuid) {
        self.trigger(EventKind::HymnViewed { id }, false);
    }

    pub fn author_upserted(&self, id: Uuid) {
        self.trigger(EventKind::AuthorUpserted { id }, true);
    }

    pub fn author_deleted(&self, id: Uuid) {
        self.trigger(EventKind::AuthorDeleted { id }, true);
    }

    pub fn category_upserted(&self, id: Uuid) {
        self.trigger(EventKind::CategoryUpserted { id }, true);
    }

    pub fn category_deleted(&self, id: Uuid) {
        self.trigger(EventKind::CategoryDeleted { id }, true);
    }

    pub fn favorite_toggled(&self, user_id: Uuid, hymn_id: Uuid) {
        self.trigger(EventKind::FavoriteToggled { user_id, hymn_id }, true);
    }

    pub fn notifications_changed(&self, user_id: Uuid) {
        self.trigger(EventKind::NotificationsChanged { user_id }, true);
    }

    pub fn notifications_broadcast(&self) {
        self.trigger(EventKind::NotificationsBroadcast, true);
    }

    pub fn profile_updated(&self, user_id: Uuid) {
        self.trigger(EventKind::ProfileUpdated { user_id }, true);
    }

    pub fn forum_post_upserted(&self, id: Uuid) {
        self.trigger(EventKind::ForumPostUpserted { id }, true);
    }

    pub fn forum_post_deleted(&self, id: Uuid) {
        self.trigger(EventKind::ForumPostDeleted { id }, true);
    }

    pub fn forum_comment_added(&self, post_id: Uuid) {
        self.trigger(EventKind::ForumCommentAdded { post_id }, true);
    }

    pub fn forum_comment_deleted(&self, post_id: Uuid) {
        self.trigger(EventKind::ForumCommentDeleted { post_id }, true);
    }

    pub fn forum_post_liked(&self, post_id: Uuid) {
        self.trigger(EventKind::ForumPostLiked { post_id }, true);
    }

    /// Like hymn views, post views are left to the background consumer.
    pub fn forum_post_viewed(&self, id: Uuid) {
        self.trigger(EventKind::ForumPostViewed { id }, false);
    }

    pub fn forum_comment_liked(&self, post_id: Uuid) {
        self.trigger(EventKind::ForumCommentLiked { post_id }, true);
    }

    pub fn bookmark_toggled(&self, user_id: Uuid, post_id: Uuid) {
        self.trigger(EventKind::BookmarkToggled { user_id, post_id }, true);
    }

    pub fn user_role_changed(&self, user_id: Uuid) {
        self.trigger(EventKind::UserRoleChanged { user_id }, true);
    }

    pub fn user_deleted(&self, user_id: Uuid) {
        self.trigger(EventKind::UserDeleted { user_id }, true);
    }

    pub fn report_changed(&self, id: Uuid) {
        self.trigger(EventKind::ReportChanged { id }, true);
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn consumer(&self) -> &Arc<CacheConsumer> {
        &self.consumer
    }
}
