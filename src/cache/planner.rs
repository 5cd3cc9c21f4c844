//! Invalidation planning.
//!
//! Maps a batch of events to the set of query-key prefixes that depend on
//! them. Keeping the mapping in one place means a mutation only has to say
//! what changed, never which reads to refresh.

use std::collections::HashSet;
use std::fmt;

use uuid::Uuid;

use super::events::{CacheEvent, EventKind};
use super::keys::{QueryKey, Resource};

#[derive(Debug, Default)]
pub struct InvalidationPlan {
    /// Prefixes to mark stale. Never contains a prefix already covered by a
    /// broader one in the set.
    pub prefixes: HashSet<QueryKey>,
    /// Drop every entry; set when events may have been lost.
    pub flush_all: bool,
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut prefixes: Vec<String> = self.prefixes.iter().map(ToString::to_string).collect();
        prefixes.sort_unstable();
        write!(
            f,
            "InvalidationPlan {{ flush_all: {}, prefixes: [{}] }}",
            self.flush_all,
            prefixes.join(", ")
        )
    }
}

impl InvalidationPlan {
    /// Deduplicates events by id and collects the prefixes they affect.
    pub fn from_events(events: Vec<CacheEvent>) -> Self {
        let mut seen_ids = HashSet::new();
        let mut prefixes = HashSet::new();

        for event in events.into_iter().filter(|e| seen_ids.insert(e.id)) {
            prefixes.extend(dependent_prefixes(&event.kind));
        }

        Self {
            prefixes: collapse(prefixes),
            flush_all: false,
        }
    }

    pub fn flush_all() -> Self {
        Self {
            prefixes: HashSet::new(),
            flush_all: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.flush_all && self.prefixes.is_empty()
    }

    /// True when `key` would be invalidated by this plan.
    pub fn covers(&self, key: &QueryKey) -> bool {
        self.flush_all || self.prefixes.iter().any(|prefix| key.starts_with(prefix))
    }
}

fn all(resource: Resource) -> QueryKey {
    QueryKey::prefix(resource)
}

fn one(resource: Resource, name: &str, id: Uuid) -> QueryKey {
    QueryKey::prefix(resource).with(name, id)
}

/// Reads that may observe the change described by `kind`.
pub fn dependent_prefixes(kind: &EventKind) -> Vec<QueryKey> {
    use Resource::*;

    match kind {
        EventKind::HymnUpserted { .. }
        | EventKind::HymnDeleted { .. }
        | EventKind::HymnStatusChanged { .. } => vec![
            all(Hymns),
            all(Hymn),
            all(Author),
            all(Categories),
            all(Category),
            all(Favorites),
            all(ForumPosts),
            all(ForumPost),
            all(Search),
            all(Dashboard),
        ],
        // Only orderings by popularity move when a hymn is viewed.
        EventKind::HymnViewed { .. } => vec![QueryKey::prefix(Hymns).with("sort", "views")],
        EventKind::AuthorUpserted { id } | EventKind::AuthorDeleted { id } => vec![
            all(Authors),
            one(Author, "id", *id),
            all(Hymns),
            all(Hymn),
            all(Category),
            all(Favorites),
            all(Search),
            all(Dashboard),
        ],
        EventKind::CategoryUpserted { id } | EventKind::CategoryDeleted { id } => vec![
            all(Categories),
            one(Category, "id", *id),
            all(Hymns),
            all(Hymn),
            all(Author),
            all(Favorites),
            all(Search),
            all(Dashboard),
        ],
        EventKind::FavoriteToggled { user_id, hymn_id } => vec![
            one(Favorites, "user", *user_id),
            one(Hymn, "id", *hymn_id),
            one(Profile, "user", *user_id),
        ],
        EventKind::NotificationsChanged { user_id } => vec![
            one(Notifications, "user", *user_id),
            one(NotificationCounts, "user", *user_id),
        ],
        EventKind::NotificationsBroadcast => vec![all(Notifications), all(NotificationCounts)],
        EventKind::ProfileUpdated { user_id } => vec![
            one(Profile, "user", *user_id),
            all(ForumPosts),
            all(ForumPost),
            all(AdminUsers),
        ],
        EventKind::ForumPostUpserted { id } | EventKind::ForumPostDeleted { id } => vec![
            all(ForumPosts),
            one(ForumPost, "id", *id),
            all(ForumTags),
            all(Bookmarks),
            all(Hymn),
            all(Profile),
            all(Dashboard),
        ],
        EventKind::ForumCommentAdded { post_id } | EventKind::ForumCommentDeleted { post_id } => {
            vec![
                one(ForumPost, "id", *post_id),
                all(ForumPosts),
                all(Bookmarks),
                all(Profile),
            ]
        }
        EventKind::ForumPostLiked { post_id } => {
            vec![one(ForumPost, "id", *post_id), all(ForumPosts), all(Bookmarks)]
        }
        EventKind::ForumPostViewed { id } => vec![
            one(ForumPost, "id", *id),
            QueryKey::prefix(ForumPosts).with("sort", "popular"),
        ],
        EventKind::ForumCommentLiked { post_id } => vec![one(ForumPost, "id", *post_id)],
        EventKind::BookmarkToggled { user_id, post_id } => vec![
            one(Bookmarks, "user", *user_id),
            one(ForumPost, "id", *post_id),
        ],
        EventKind::UserRoleChanged { user_id } => vec![
            all(AdminUsers),
            one(Profile, "user", *user_id),
            all(Dashboard),
        ],
        EventKind::UserDeleted { user_id } => vec![
            all(AdminUsers),
            one(Profile, "user", *user_id),
            one(Favorites, "user", *user_id),
            one(Notifications, "user", *user_id),
            one(NotificationCounts, "user", *user_id),
            one(Bookmarks, "user", *user_id),
            all(ForumPosts),
            all(ForumPost),
            all(Hymn),
            all(Dashboard),
        ],
        EventKind::ReportChanged { .. } => vec![all(AdminReports), all(Dashboard)],
    }
}

/// Removes prefixes that a broader prefix in the set already covers.
fn collapse(prefixes: HashSet<QueryKey>) -> HashSet<QueryKey> {
    prefixes
        .iter()
        .filter(|candidate| {
            !prefixes
                .iter()
                .any(|other| other != *candidate && candidate.starts_with(other))
        })
        .cloned()
        .collect()
}
