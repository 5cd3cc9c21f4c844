//! Domain entities mirrored from persistent storage, plus the joined views
//! assembled from them.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{
    HymnStatus, NotificationKind, ReportStatus, ReportTarget, ThemePreference, UserRole,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HymnRecord {
    pub id: Uuid,
    pub number: Option<i32>,
    pub title: String,
    pub lyrics: String,
    pub status: HymnStatus,
    pub view_count: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_viewed_at: Option<OffsetDateTime>,
    pub created_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorRecord {
    pub id: Uuid,
    pub name: String,
    pub biography: Option<String>,
    pub birth_year: Option<i32>,
    pub death_year: Option<i32>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryWithCount {
    #[serde(flatten)]
    pub category: CategoryRecord,
    pub hymn_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AuthorRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CategoryRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HymnRef {
    pub id: Uuid,
    pub title: String,
}

/// Listing shape: a hymn flattened together with its authors and categories.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HymnSummary {
    pub id: Uuid,
    pub number: Option<i32>,
    pub title: String,
    pub status: HymnStatus,
    pub view_count: i64,
    pub authors: Vec<AuthorRef>,
    pub categories: Vec<CategoryRef>,
}

impl HymnSummary {
    pub fn from_record(
        record: &HymnRecord,
        authors: Vec<AuthorRef>,
        categories: Vec<CategoryRef>,
    ) -> Self {
        Self {
            id: record.id,
            number: record.number,
            title: record.title.clone(),
            status: record.status,
            view_count: record.view_count,
            authors,
            categories,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HymnPdfRecord {
    pub id: Uuid,
    pub hymn_id: Uuid,
    pub pdf_url: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HymnAudioRecord {
    pub id: Uuid,
    pub hymn_id: Uuid,
    pub pdf_id: Option<Uuid>,
    pub audio_url: String,
    pub title: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HymnVideoRecord {
    pub id: Uuid,
    pub hymn_id: Uuid,
    pub pdf_id: Option<Uuid>,
    pub video_url: String,
    pub source: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HymnMedia {
    pub pdfs: Vec<HymnPdfRecord>,
    pub audio: Vec<HymnAudioRecord>,
    pub videos: Vec<HymnVideoRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorDetail {
    pub author: AuthorRecord,
    pub hymns: Vec<HymnSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub role: UserRole,
    pub theme: ThemePreference,
    pub reputation: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRef {
    pub id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl From<&UserRecord> for UserRef {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProfileStats {
    pub favorites: u64,
    pub posts: u64,
    pub comments: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub user: UserRecord,
    pub stats: ProfileStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub prefix: String,
    #[serde(skip)]
    pub hashed_secret: Vec<u8>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub revoked_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FavoriteRecord {
    pub hymn: HymnSummary,
    #[serde(with = "time::serde::rfc3339")]
    pub favorited_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForumTagRecord {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagWithCount {
    pub id: Uuid,
    pub name: String,
    pub post_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForumPostRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub hymn_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub view_count: i64,
    pub is_pinned: bool,
    pub is_featured: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForumPostSummary {
    pub id: Uuid,
    pub title: String,
    pub author: UserRef,
    pub hymn: Option<HymnRef>,
    pub tags: Vec<ForumTagRecord>,
    pub comment_count: u64,
    pub like_count: u64,
    pub view_count: i64,
    pub is_pinned: bool,
    pub is_featured: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForumCommentRecord {
    pub id: Uuid,
    pub post_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author: UserRef,
    pub content: String,
    pub like_count: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForumPostDetail {
    #[serde(flatten)]
    pub summary: ForumPostSummary,
    pub content: String,
    pub comments: Vec<ForumCommentRecord>,
    pub liked_by_viewer: bool,
    pub bookmarked_by_viewer: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRecord {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub target_kind: ReportTarget,
    pub target_id: Uuid,
    pub reason: String,
    pub status: ReportStatus,
    pub resolution_note: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub hymns_pending: u64,
    pub hymns_approved: u64,
    pub hymns_rejected: u64,
    pub authors: u64,
    pub categories: u64,
    pub users: u64,
    pub forum_posts: u64,
    pub open_reports: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchHitKind {
    Hymn,
    Author,
    Category,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub kind: SearchHitKind,
    pub id: Uuid,
    pub title: String,
    pub excerpt: Option<String>,
    pub path: String,
}
