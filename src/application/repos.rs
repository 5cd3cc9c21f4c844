//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{PageRequest, Paginated};
use crate::domain::entities::{
    AuthorRecord, AuthorRef, CategoryRecord, CategoryRef, CategoryWithCount, DashboardStats,
    FavoriteRecord, ForumCommentRecord, ForumPostRecord, ForumPostSummary, HymnAudioRecord,
    HymnMedia, HymnPdfRecord, HymnRecord, HymnSummary, HymnVideoRecord, NotificationRecord,
    ProfileStats, ReportRecord, SessionRecord, TagWithCount, UserRecord, UserRef,
};
use crate::domain::forum::{CommentDraft, PostDraft};
use crate::domain::hymns::{AuthorDraft, CategoryDraft, HymnDraft};
use crate::domain::types::{
    ForumSort, HymnSort, HymnStatus, NotificationKind, ReportStatus, ReportTarget, SortDirection,
    ThemePreference, UserRole,
};
use crate::domain::users::{NotificationDraft, ProfileDraft};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Filters for hymn listings. `status: None` means every status and is only
/// reachable from the admin surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct HymnQueryFilter {
    pub status: Option<HymnStatus>,
    pub search: Option<String>,
    pub author_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub sort: HymnSort,
    pub direction: Option<SortDirection>,
}

impl HymnQueryFilter {
    pub fn approved() -> Self {
        Self {
            status: Some(HymnStatus::Approved),
            ..Self::default()
        }
    }

    /// Direction applied when the caller did not pick one: ascending for
    /// textual and numeric order, descending for popularity and recency.
    pub fn effective_direction(&self) -> SortDirection {
        self.direction.unwrap_or(match self.sort {
            HymnSort::Title | HymnSort::Number => SortDirection::Asc,
            HymnSort::Views | HymnSort::Recent => SortDirection::Desc,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ForumPostFilter {
    pub search: Option<String>,
    pub tag: Option<String>,
    pub hymn_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub sort: ForumSort,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct UserQueryFilter {
    pub search: Option<String>,
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NotificationFilter {
    pub unread_only: bool,
    pub kinds: Vec<NotificationKind>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ReportQueryFilter {
    pub status: Option<ReportStatus>,
    pub target_kind: Option<ReportTarget>,
}

#[derive(Debug, Clone)]
pub struct CreateHymnParams {
    pub draft: HymnDraft,
    pub status: HymnStatus,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct UpdateHymnParams {
    pub id: Uuid,
    pub draft: HymnDraft,
}

#[derive(Debug, Clone)]
pub enum NewMedia {
    Pdf {
        url: String,
        description: Option<String>,
    },
    Audio {
        url: String,
        title: Option<String>,
        pdf_id: Option<Uuid>,
    },
    Video {
        url: String,
        source: Option<String>,
        pdf_id: Option<Uuid>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "media", rename_all = "snake_case")]
pub enum MediaRecord {
    Pdf(HymnPdfRecord),
    Audio(HymnAudioRecord),
    Video(HymnVideoRecord),
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
}

#[derive(Debug, Clone)]
pub struct CreateSessionParams {
    pub user_id: Uuid,
    pub prefix: String,
    pub hashed_secret: Vec<u8>,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct CreateForumPostParams {
    pub user_id: Uuid,
    pub hymn_id: Option<Uuid>,
    pub draft: PostDraft,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub draft: CommentDraft,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub draft: NotificationDraft,
}

#[derive(Debug, Clone)]
pub struct CreateReportParams {
    pub reporter_id: Uuid,
    pub target_kind: ReportTarget,
    pub target_id: Uuid,
    pub reason: String,
}

#[async_trait]
pub trait HymnsRepo: Send + Sync {
    async fn list_hymns(
        &self,
        filter: &HymnQueryFilter,
        page: PageRequest,
    ) -> Result<Paginated<HymnSummary>, RepoError>;

    async fn find_hymn(&self, id: Uuid) -> Result<Option<HymnRecord>, RepoError>;

    async fn hymn_authors(&self, hymn_id: Uuid) -> Result<Vec<AuthorRef>, RepoError>;

    async fn hymn_categories(&self, hymn_id: Uuid) -> Result<Vec<CategoryRef>, RepoError>;

    async fn hymn_media(&self, hymn_id: Uuid) -> Result<HymnMedia, RepoError>;

    /// Approved hymns sharing at least one author or category with `hymn_id`,
    /// most viewed first.
    async fn hymns_sharing_links(
        &self,
        hymn_id: Uuid,
        limit: usize,
    ) -> Result<Vec<HymnSummary>, RepoError>;

    /// Most viewed approved hymns, skipping `exclude`.
    async fn most_viewed_hymns(
        &self,
        exclude: &[Uuid],
        limit: usize,
    ) -> Result<Vec<HymnSummary>, RepoError>;

    async fn increment_view(&self, hymn_id: Uuid, at: OffsetDateTime) -> Result<(), RepoError>;
}

#[async_trait]
pub trait HymnsWriteRepo: Send + Sync {
    async fn create_hymn(&self, params: CreateHymnParams) -> Result<HymnRecord, RepoError>;

    async fn update_hymn(&self, params: UpdateHymnParams) -> Result<HymnRecord, RepoError>;

    async fn set_hymn_status(&self, id: Uuid, status: HymnStatus)
    -> Result<HymnRecord, RepoError>;

    async fn delete_hymn(&self, id: Uuid) -> Result<(), RepoError>;

    /// Replaces the author and category links of a hymn in one transaction.
    async fn replace_hymn_links(
        &self,
        hymn_id: Uuid,
        author_ids: &[Uuid],
        category_ids: &[Uuid],
    ) -> Result<(), RepoError>;

    async fn attach_media(&self, hymn_id: Uuid, media: NewMedia)
    -> Result<MediaRecord, RepoError>;

    /// Removes a PDF, audio or video row of the hymn; `false` when nothing matched.
    async fn detach_media(&self, hymn_id: Uuid, media_id: Uuid) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait CatalogRepo: Send + Sync {
    async fn list_authors(
        &self,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Paginated<AuthorRecord>, RepoError>;

    async fn find_author(&self, id: Uuid) -> Result<Option<AuthorRecord>, RepoError>;

    /// Approved hymns credited to the author, ordered by title.
    async fn author_hymns(&self, author_id: Uuid) -> Result<Vec<HymnSummary>, RepoError>;

    /// Every category with the number of approved hymns it contains.
    async fn list_categories(&self) -> Result<Vec<CategoryWithCount>, RepoError>;

    async fn search_categories(
        &self,
        search: &str,
        page: PageRequest,
    ) -> Result<Paginated<CategoryRecord>, RepoError>;

    async fn find_category(&self, id: Uuid) -> Result<Option<CategoryRecord>, RepoError>;

    /// Approved hymns of one category, paged with a single joined query.
    async fn list_category_hymns(
        &self,
        category_id: Uuid,
        page: PageRequest,
    ) -> Result<Paginated<HymnSummary>, RepoError>;
}

#[async_trait]
pub trait CatalogWriteRepo: Send + Sync {
    async fn create_author(&self, draft: AuthorDraft) -> Result<AuthorRecord, RepoError>;

    async fn update_author(&self, id: Uuid, draft: AuthorDraft)
    -> Result<AuthorRecord, RepoError>;

    async fn delete_author(&self, id: Uuid) -> Result<(), RepoError>;

    async fn count_author_links(&self, id: Uuid) -> Result<u64, RepoError>;

    async fn create_category(&self, draft: CategoryDraft) -> Result<CategoryRecord, RepoError>;

    async fn update_category(
        &self,
        id: Uuid,
        draft: CategoryDraft,
    ) -> Result<CategoryRecord, RepoError>;

    async fn delete_category(&self, id: Uuid) -> Result<(), RepoError>;

    async fn count_category_links(&self, id: Uuid) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;

    async fn update_profile(&self, id: Uuid, draft: ProfileDraft)
    -> Result<UserRecord, RepoError>;

    async fn update_theme(
        &self,
        id: Uuid,
        theme: ThemePreference,
    ) -> Result<UserRecord, RepoError>;

    async fn adjust_reputation(&self, id: Uuid, delta: i32) -> Result<(), RepoError>;

    async fn profile_stats(&self, id: Uuid) -> Result<ProfileStats, RepoError>;

    async fn list_users(
        &self,
        filter: &UserQueryFilter,
        page: PageRequest,
    ) -> Result<Paginated<UserRecord>, RepoError>;

    /// Unpaged variant of `list_users` for exports.
    async fn export_users(&self, filter: &UserQueryFilter) -> Result<Vec<UserRecord>, RepoError>;

    async fn set_role(&self, id: Uuid, role: UserRole) -> Result<UserRecord, RepoError>;

    async fn delete_user(&self, id: Uuid) -> Result<(), RepoError>;

    /// Ids of every user, or of the users holding `role`.
    async fn user_ids(&self, role: Option<UserRole>) -> Result<Vec<Uuid>, RepoError>;

    /// Users whose display name, lowercased and without whitespace, equals
    /// one of `handles`.
    async fn find_users_by_handles(&self, handles: &[String]) -> Result<Vec<UserRef>, RepoError>;
}

#[async_trait]
pub trait SessionsRepo: Send + Sync {
    async fn create_session(&self, params: CreateSessionParams)
    -> Result<SessionRecord, RepoError>;

    async fn find_session_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<SessionRecord>, RepoError>;

    async fn revoke_session(&self, id: Uuid, revoked_at: OffsetDateTime)
    -> Result<(), RepoError>;
}

#[async_trait]
pub trait FavoritesRepo: Send + Sync {
    /// Flips the favorite flag atomically and returns the new state.
    async fn toggle_favorite(&self, user_id: Uuid, hymn_id: Uuid) -> Result<bool, RepoError>;

    async fn is_favorite(&self, user_id: Uuid, hymn_id: Uuid) -> Result<bool, RepoError>;

    async fn list_favorites(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Paginated<FavoriteRecord>, RepoError>;
}

#[async_trait]
pub trait ForumRepo: Send + Sync {
    async fn list_posts(
        &self,
        filter: &ForumPostFilter,
        page: PageRequest,
    ) -> Result<Paginated<ForumPostSummary>, RepoError>;

    async fn find_post(&self, id: Uuid) -> Result<Option<ForumPostRecord>, RepoError>;

    async fn post_summary(&self, id: Uuid) -> Result<Option<ForumPostSummary>, RepoError>;

    /// Comments of a post in creation order.
    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<ForumCommentRecord>, RepoError>;

    async fn find_comment(&self, id: Uuid) -> Result<Option<ForumCommentRecord>, RepoError>;

    async fn has_liked(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError>;

    async fn is_bookmarked(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError>;

    /// Posts the user bookmarked, most recently bookmarked first.
    async fn list_bookmarks(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Paginated<ForumPostSummary>, RepoError>;

    async fn increment_post_view(&self, id: Uuid) -> Result<(), RepoError>;

    async fn list_tags(&self) -> Result<Vec<TagWithCount>, RepoError>;
}

#[async_trait]
pub trait ForumWriteRepo: Send + Sync {
    /// Inserts the post and upserts its tags in one transaction.
    async fn create_post(&self, params: CreateForumPostParams)
    -> Result<ForumPostRecord, RepoError>;

    async fn update_post(&self, id: Uuid, draft: PostDraft)
    -> Result<ForumPostRecord, RepoError>;

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError>;

    async fn add_comment(&self, params: CreateCommentParams)
    -> Result<ForumCommentRecord, RepoError>;

    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError>;

    /// Flips the like flag atomically and returns the new state.
    async fn toggle_like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError>;

    async fn toggle_comment_like(&self, comment_id: Uuid, user_id: Uuid)
    -> Result<bool, RepoError>;

    async fn toggle_bookmark(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError>;

    async fn set_featured(&self, id: Uuid, featured: bool) -> Result<ForumPostRecord, RepoError>;
}

#[async_trait]
pub trait NotificationsRepo: Send + Sync {
    async fn list_notifications(
        &self,
        user_id: Uuid,
        filter: &NotificationFilter,
        page: PageRequest,
    ) -> Result<Paginated<NotificationRecord>, RepoError>;

    /// `(total, unread)` for the user.
    async fn notification_counts(&self, user_id: Uuid) -> Result<(u64, u64), RepoError>;

    /// Marks the given notifications, or every notification when `ids` is
    /// `None`, as read. Only rows owned by `user_id` are touched.
    async fn mark_read(&self, user_id: Uuid, ids: Option<&[Uuid]>) -> Result<u64, RepoError>;

    async fn create_notifications(&self, batch: Vec<NewNotification>) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait ReportsRepo: Send + Sync {
    async fn create_report(&self, params: CreateReportParams) -> Result<ReportRecord, RepoError>;

    async fn list_reports(
        &self,
        filter: &ReportQueryFilter,
        page: PageRequest,
    ) -> Result<Paginated<ReportRecord>, RepoError>;

    async fn find_report(&self, id: Uuid) -> Result<Option<ReportRecord>, RepoError>;

    async fn update_report_status(
        &self,
        id: Uuid,
        status: ReportStatus,
        note: Option<String>,
    ) -> Result<ReportRecord, RepoError>;
}

#[async_trait]
pub trait DashboardRepo: Send + Sync {
    async fn dashboard_stats(&self) -> Result<DashboardStats, RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn health_check(&self) -> Result<(), RepoError>;
}
