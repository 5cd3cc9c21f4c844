//! In-memory repositories and a wired application for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use uuid::Uuid;

use hymnary::application::admin::{
    AdminCatalogService, AdminDashboardService, AdminHymnService, AdminUserService,
};
use hymnary::application::catalog::CatalogService;
use hymnary::application::favorites::FavoritesService;
use hymnary::application::forum::ForumService;
use hymnary::application::hymns::HymnService;
use hymnary::application::notifications::NotificationService;
use hymnary::application::pagination::{PageRequest, Paginated, paginate_slice};
use hymnary::application::profile::ProfileService;
use hymnary::application::reports::ReportService;
use hymnary::application::repos::{
    CatalogRepo, CatalogWriteRepo, CreateCommentParams, CreateForumPostParams, CreateHymnParams,
    CreateReportParams, CreateSessionParams, CreateUserParams, DashboardRepo, FavoritesRepo,
    ForumPostFilter, ForumRepo, ForumWriteRepo, HealthRepo, HymnQueryFilter, HymnsRepo,
    HymnsWriteRepo, MediaRecord, NewMedia, NewNotification, NotificationFilter,
    NotificationsRepo, ReportQueryFilter, ReportsRepo, RepoError, SessionsRepo,
    UpdateHymnParams, UserQueryFilter, UsersRepo,
};
use hymnary::application::session::{SessionContext, SessionService};
use hymnary::cache::{CacheConfig, QueryCache};
use hymnary::domain::entities::{
    AuthorRecord, AuthorRef, CategoryRecord, CategoryRef, CategoryWithCount, DashboardStats,
    FavoriteRecord, ForumCommentRecord, ForumPostRecord, ForumPostSummary, ForumTagRecord,
    HymnAudioRecord, HymnMedia, HymnPdfRecord, HymnRecord, HymnRef, HymnSummary,
    HymnVideoRecord, NotificationRecord, ProfileStats, ReportRecord, SessionRecord, TagWithCount,
    UserRecord, UserRef,
};
use hymnary::domain::forum::{PostDraft, mention_handle};
use hymnary::domain::hymns::{AuthorDraft, CategoryDraft};
use hymnary::domain::types::{
    ForumSort, HymnSort, HymnStatus, ReportStatus, SortDirection, ThemePreference, UserRole,
};
use hymnary::domain::users::ProfileDraft;
use hymnary::infra::http::{AdminState, ApiState};
use hymnary::presentation::SiteIdentity;

const EPOCH: OffsetDateTime = datetime!(2024-01-01 00:00 UTC);

#[derive(Debug, Clone)]
struct StoredComment {
    id: Uuid,
    post_id: Uuid,
    parent_id: Option<Uuid>,
    user_id: Uuid,
    content: String,
    created_at: OffsetDateTime,
}

#[derive(Default)]
struct MemoryState {
    clock: i64,
    hymns: Vec<HymnRecord>,
    hymn_authors: Vec<(Uuid, Uuid)>,
    hymn_categories: Vec<(Uuid, Uuid)>,
    authors: Vec<AuthorRecord>,
    categories: Vec<CategoryRecord>,
    pdfs: Vec<HymnPdfRecord>,
    audio: Vec<HymnAudioRecord>,
    videos: Vec<HymnVideoRecord>,
    users: Vec<UserRecord>,
    sessions: Vec<SessionRecord>,
    favorites: Vec<(Uuid, Uuid, OffsetDateTime)>,
    posts: Vec<ForumPostRecord>,
    post_tags: Vec<(Uuid, ForumTagRecord)>,
    comments: Vec<StoredComment>,
    likes: Vec<(Uuid, Uuid)>,
    comment_likes: Vec<(Uuid, Uuid)>,
    bookmarks: Vec<(Uuid, Uuid, OffsetDateTime)>,
    notifications: Vec<NotificationRecord>,
    reports: Vec<ReportRecord>,
}

impl MemoryState {
    fn tick(&mut self) -> OffsetDateTime {
        self.clock += 1;
        EPOCH + Duration::seconds(self.clock)
    }

    fn summary(&self, hymn: &HymnRecord) -> HymnSummary {
        let authors = self
            .hymn_authors
            .iter()
            .filter(|(hymn_id, _)| *hymn_id == hymn.id)
            .filter_map(|(_, author_id)| self.authors.iter().find(|a| a.id == *author_id))
            .map(|author| AuthorRef {
                id: author.id,
                name: author.name.clone(),
            })
            .collect();
        let categories = self
            .hymn_categories
            .iter()
            .filter(|(hymn_id, _)| *hymn_id == hymn.id)
            .filter_map(|(_, category_id)| self.categories.iter().find(|c| c.id == *category_id))
            .map(|category| CategoryRef {
                id: category.id,
                name: category.name.clone(),
            })
            .collect();
        HymnSummary::from_record(hymn, authors, categories)
    }

    fn approved(&self) -> impl Iterator<Item = &HymnRecord> {
        self.hymns
            .iter()
            .filter(|hymn| hymn.status == HymnStatus::Approved)
    }

    fn user_ref(&self, id: Uuid) -> UserRef {
        self.users
            .iter()
            .find(|user| user.id == id)
            .map(UserRef::from)
            .unwrap_or(UserRef {
                id,
                display_name: String::new(),
                avatar_url: None,
            })
    }

    fn comment(&self, stored: &StoredComment) -> ForumCommentRecord {
        ForumCommentRecord {
            id: stored.id,
            post_id: stored.post_id,
            parent_id: stored.parent_id,
            author: self.user_ref(stored.user_id),
            content: stored.content.clone(),
            like_count: self
                .comment_likes
                .iter()
                .filter(|(c, _)| *c == stored.id)
                .count() as u64,
            created_at: stored.created_at,
        }
    }

    fn post_summary(&self, post: &ForumPostRecord) -> ForumPostSummary {
        let hymn = post.hymn_id.and_then(|id| {
            self.hymns.iter().find(|h| h.id == id).map(|h| HymnRef {
                id: h.id,
                title: h.title.clone(),
            })
        });
        ForumPostSummary {
            id: post.id,
            title: post.title.clone(),
            author: self.user_ref(post.user_id),
            hymn,
            tags: self
                .post_tags
                .iter()
                .filter(|(post_id, _)| *post_id == post.id)
                .map(|(_, tag)| tag.clone())
                .collect(),
            comment_count: self.comments.iter().filter(|c| c.post_id == post.id).count() as u64,
            like_count: self.likes.iter().filter(|(p, _)| *p == post.id).count() as u64,
            view_count: post.view_count,
            is_pinned: post.is_pinned,
            is_featured: post.is_featured,
            created_at: post.created_at,
        }
    }

    fn replace_tags(&mut self, post_id: Uuid, draft: &PostDraft) {
        self.post_tags.retain(|(id, _)| *id != post_id);
        for name in &draft.tags {
            let existing = self
                .post_tags
                .iter()
                .find(|(_, tag)| tag.name == *name)
                .map(|(_, tag)| tag.clone());
            let tag = existing.unwrap_or(ForumTagRecord {
                id: Uuid::new_v4(),
                name: name.clone(),
            });
            self.post_tags.push((post_id, tag));
        }
    }

    fn filtered_users(&self, filter: &UserQueryFilter) -> Vec<UserRecord> {
        let needle = filter.search.as_deref().map(str::to_lowercase);
        let mut users: Vec<UserRecord> = self
            .users
            .iter()
            .filter(|user| filter.role.is_none_or(|role| user.role == role))
            .filter(|user| {
                needle.as_deref().is_none_or(|needle| {
                    user.email.to_lowercase().contains(needle)
                        || user.display_name.to_lowercase().contains(needle)
                })
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        users
    }
}

/// Every repository trait over one mutex-guarded state.
#[derive(Default)]
pub struct MemoryRepos {
    state: Mutex<MemoryState>,
    offline: AtomicBool,
}

impl MemoryRepos {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every subsequent read fail as a database timeout.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), RepoError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(RepoError::Timeout)
        } else {
            Ok(())
        }
    }

    pub async fn seed_user(&self, name: &str, role: UserRole) -> UserRecord {
        let mut state = self.state.lock().await;
        let user = UserRecord {
            id: Uuid::new_v4(),
            email: format!("{}@example.org", name.to_lowercase()),
            display_name: name.to_string(),
            avatar_url: None,
            bio: None,
            role,
            theme: ThemePreference::System,
            reputation: 0,
            created_at: state.tick(),
        };
        state.users.push(user.clone());
        user
    }

    pub async fn seed_hymn(&self, title: &str, status: HymnStatus) -> HymnRecord {
        let mut state = self.state.lock().await;
        let now = state.tick();
        let hymn = HymnRecord {
            id: Uuid::new_v4(),
            number: None,
            title: title.to_string(),
            lyrics: format!("{title}\nAmen."),
            status,
            view_count: 0,
            last_viewed_at: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        };
        state.hymns.push(hymn.clone());
        hymn
    }

    pub async fn seed_author(&self, name: &str) -> AuthorRecord {
        let mut state = self.state.lock().await;
        let author = AuthorRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            biography: None,
            birth_year: None,
            death_year: None,
            created_at: state.tick(),
        };
        state.authors.push(author.clone());
        author
    }

    pub async fn seed_category(&self, name: &str) -> CategoryRecord {
        let mut state = self.state.lock().await;
        let category = CategoryRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            created_at: state.tick(),
        };
        state.categories.push(category.clone());
        category
    }

    pub async fn link_author(&self, hymn_id: Uuid, author_id: Uuid) {
        self.state
            .lock()
            .await
            .hymn_authors
            .push((hymn_id, author_id));
    }

    pub async fn link_category(&self, hymn_id: Uuid, category_id: Uuid) {
        self.state
            .lock()
            .await
            .hymn_categories
            .push((hymn_id, category_id));
    }

    pub async fn user(&self, id: Uuid) -> Option<UserRecord> {
        self.state
            .lock()
            .await
            .users
            .iter()
            .find(|user| user.id == id)
            .cloned()
    }

    pub async fn hymn(&self, id: Uuid) -> Option<HymnRecord> {
        self.state
            .lock()
            .await
            .hymns
            .iter()
            .find(|hymn| hymn.id == id)
            .cloned()
    }

    pub async fn notifications_for(&self, user_id: Uuid) -> Vec<NotificationRecord> {
        self.state
            .lock()
            .await
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect()
    }
}

fn missing() -> RepoError {
    RepoError::NotFound
}

#[async_trait]
impl HymnsRepo for MemoryRepos {
    async fn list_hymns(
        &self,
        filter: &HymnQueryFilter,
        page: PageRequest,
    ) -> Result<Paginated<HymnSummary>, RepoError> {
        self.ensure_online()?;
        let state = self.state.lock().await;
        let needle = filter.search.as_deref().map(str::to_lowercase);
        let mut hymns: Vec<&HymnRecord> = state
            .hymns
            .iter()
            .filter(|hymn| filter.status.is_none_or(|status| hymn.status == status))
            .filter(|hymn| {
                needle.as_deref().is_none_or(|needle| {
                    hymn.title.to_lowercase().contains(needle)
                        || hymn.lyrics.to_lowercase().contains(needle)
                })
            })
            .filter(|hymn| {
                filter.author_id.is_none_or(|author_id| {
                    state.hymn_authors.contains(&(hymn.id, author_id))
                })
            })
            .filter(|hymn| {
                filter.category_id.is_none_or(|category_id| {
                    state.hymn_categories.contains(&(hymn.id, category_id))
                })
            })
            .collect();

        hymns.sort_by(|a, b| match filter.sort {
            HymnSort::Title => a.title.cmp(&b.title),
            HymnSort::Number => a.number.cmp(&b.number),
            HymnSort::Views => a.view_count.cmp(&b.view_count),
            HymnSort::Recent => a.created_at.cmp(&b.created_at),
        });
        if filter.effective_direction() == SortDirection::Desc {
            hymns.reverse();
        }

        let summaries: Vec<HymnSummary> = hymns.into_iter().map(|h| state.summary(h)).collect();
        Ok(paginate_slice(&summaries, page))
    }

    async fn find_hymn(&self, id: Uuid) -> Result<Option<HymnRecord>, RepoError> {
        self.ensure_online()?;
        let state = self.state.lock().await;
        Ok(state.hymns.iter().find(|hymn| hymn.id == id).cloned())
    }

    async fn hymn_authors(&self, hymn_id: Uuid) -> Result<Vec<AuthorRef>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .hymns
            .iter()
            .find(|hymn| hymn.id == hymn_id)
            .map(|hymn| state.summary(hymn).authors)
            .unwrap_or_default())
    }

    async fn hymn_categories(&self, hymn_id: Uuid) -> Result<Vec<CategoryRef>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .hymns
            .iter()
            .find(|hymn| hymn.id == hymn_id)
            .map(|hymn| state.summary(hymn).categories)
            .unwrap_or_default())
    }

    async fn hymn_media(&self, hymn_id: Uuid) -> Result<HymnMedia, RepoError> {
        let state = self.state.lock().await;
        Ok(HymnMedia {
            pdfs: state
                .pdfs
                .iter()
                .filter(|pdf| pdf.hymn_id == hymn_id)
                .cloned()
                .collect(),
            audio: state
                .audio
                .iter()
                .filter(|audio| audio.hymn_id == hymn_id)
                .cloned()
                .collect(),
            videos: state
                .videos
                .iter()
                .filter(|video| video.hymn_id == hymn_id)
                .cloned()
                .collect(),
        })
    }

    async fn hymns_sharing_links(
        &self,
        hymn_id: Uuid,
        limit: usize,
    ) -> Result<Vec<HymnSummary>, RepoError> {
        let state = self.state.lock().await;
        let authors: Vec<Uuid> = state
            .hymn_authors
            .iter()
            .filter(|(h, _)| *h == hymn_id)
            .map(|(_, a)| *a)
            .collect();
        let categories: Vec<Uuid> = state
            .hymn_categories
            .iter()
            .filter(|(h, _)| *h == hymn_id)
            .map(|(_, c)| *c)
            .collect();
        let mut related: Vec<&HymnRecord> = state
            .approved()
            .filter(|hymn| hymn.id != hymn_id)
            .filter(|hymn| {
                authors
                    .iter()
                    .any(|a| state.hymn_authors.contains(&(hymn.id, *a)))
                    || categories
                        .iter()
                        .any(|c| state.hymn_categories.contains(&(hymn.id, *c)))
            })
            .collect();
        related.sort_by(|a, b| b.view_count.cmp(&a.view_count));
        Ok(related
            .into_iter()
            .take(limit)
            .map(|h| state.summary(h))
            .collect())
    }

    async fn most_viewed_hymns(
        &self,
        exclude: &[Uuid],
        limit: usize,
    ) -> Result<Vec<HymnSummary>, RepoError> {
        let state = self.state.lock().await;
        let mut hymns: Vec<&HymnRecord> = state
            .approved()
            .filter(|hymn| !exclude.contains(&hymn.id))
            .collect();
        hymns.sort_by(|a, b| b.view_count.cmp(&a.view_count));
        Ok(hymns
            .into_iter()
            .take(limit)
            .map(|h| state.summary(h))
            .collect())
    }

    async fn increment_view(&self, hymn_id: Uuid, at: OffsetDateTime) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        let hymn = state
            .hymns
            .iter_mut()
            .find(|hymn| hymn.id == hymn_id)
            .ok_or_else(missing)?;
        hymn.view_count += 1;
        hymn.last_viewed_at = Some(at);
        Ok(())
    }
}

#[async_trait]
impl HymnsWriteRepo for MemoryRepos {
    async fn create_hymn(&self, params: CreateHymnParams) -> Result<HymnRecord, RepoError> {
        let mut state = self.state.lock().await;
        let now = state.tick();
        let hymn = HymnRecord {
            id: Uuid::new_v4(),
            number: params.draft.number,
            title: params.draft.title,
            lyrics: params.draft.lyrics,
            status: params.status,
            view_count: 0,
            last_viewed_at: None,
            created_by: params.created_by,
            created_at: now,
            updated_at: now,
        };
        state.hymns.push(hymn.clone());
        Ok(hymn)
    }

    async fn update_hymn(&self, params: UpdateHymnParams) -> Result<HymnRecord, RepoError> {
        let mut state = self.state.lock().await;
        let now = state.tick();
        let hymn = state
            .hymns
            .iter_mut()
            .find(|hymn| hymn.id == params.id)
            .ok_or_else(missing)?;
        hymn.number = params.draft.number;
        hymn.title = params.draft.title;
        hymn.lyrics = params.draft.lyrics;
        hymn.updated_at = now;
        Ok(hymn.clone())
    }

    async fn set_hymn_status(
        &self,
        id: Uuid,
        status: HymnStatus,
    ) -> Result<HymnRecord, RepoError> {
        let mut state = self.state.lock().await;
        let now = state.tick();
        let hymn = state
            .hymns
            .iter_mut()
            .find(|hymn| hymn.id == id)
            .ok_or_else(missing)?;
        hymn.status = status;
        hymn.updated_at = now;
        Ok(hymn.clone())
    }

    async fn delete_hymn(&self, id: Uuid) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        let before = state.hymns.len();
        state.hymns.retain(|hymn| hymn.id != id);
        if state.hymns.len() == before {
            return Err(missing());
        }
        state.hymn_authors.retain(|(h, _)| *h != id);
        state.hymn_categories.retain(|(h, _)| *h != id);
        state.favorites.retain(|(_, h, _)| *h != id);
        Ok(())
    }

    async fn replace_hymn_links(
        &self,
        hymn_id: Uuid,
        author_ids: &[Uuid],
        category_ids: &[Uuid],
    ) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        state.hymn_authors.retain(|(h, _)| *h != hymn_id);
        state.hymn_categories.retain(|(h, _)| *h != hymn_id);
        state
            .hymn_authors
            .extend(author_ids.iter().map(|a| (hymn_id, *a)));
        state
            .hymn_categories
            .extend(category_ids.iter().map(|c| (hymn_id, *c)));
        Ok(())
    }

    async fn attach_media(
        &self,
        hymn_id: Uuid,
        media: NewMedia,
    ) -> Result<MediaRecord, RepoError> {
        let mut state = self.state.lock().await;
        let created_at = state.tick();
        let record = match media {
            NewMedia::Pdf { url, description } => {
                let pdf = HymnPdfRecord {
                    id: Uuid::new_v4(),
                    hymn_id,
                    pdf_url: url,
                    description,
                    created_at,
                };
                state.pdfs.push(pdf.clone());
                MediaRecord::Pdf(pdf)
            }
            NewMedia::Audio { url, title, pdf_id } => {
                let audio = HymnAudioRecord {
                    id: Uuid::new_v4(),
                    hymn_id,
                    pdf_id,
                    audio_url: url,
                    title,
                    created_at,
                };
                state.audio.push(audio.clone());
                MediaRecord::Audio(audio)
            }
            NewMedia::Video {
                url,
                source,
                pdf_id,
            } => {
                let video = HymnVideoRecord {
                    id: Uuid::new_v4(),
                    hymn_id,
                    pdf_id,
                    video_url: url,
                    source,
                    created_at,
                };
                state.videos.push(video.clone());
                MediaRecord::Video(video)
            }
        };
        Ok(record)
    }

    async fn detach_media(&self, hymn_id: Uuid, media_id: Uuid) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        let before = state.pdfs.len() + state.audio.len() + state.videos.len();
        state
            .pdfs
            .retain(|m| !(m.hymn_id == hymn_id && m.id == media_id));
        state
            .audio
            .retain(|m| !(m.hymn_id == hymn_id && m.id == media_id));
        state
            .videos
            .retain(|m| !(m.hymn_id == hymn_id && m.id == media_id));
        Ok(state.pdfs.len() + state.audio.len() + state.videos.len() < before)
    }
}

#[async_trait]
impl CatalogRepo for MemoryRepos {
    async fn list_authors(
        &self,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Paginated<AuthorRecord>, RepoError> {
        self.ensure_online()?;
        let state = self.state.lock().await;
        let needle = search.map(str::to_lowercase);
        let mut authors: Vec<AuthorRecord> = state
            .authors
            .iter()
            .filter(|author| {
                needle
                    .as_deref()
                    .is_none_or(|needle| author.name.to_lowercase().contains(needle))
            })
            .cloned()
            .collect();
        authors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(paginate_slice(&authors, page))
    }

    async fn find_author(&self, id: Uuid) -> Result<Option<AuthorRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.authors.iter().find(|a| a.id == id).cloned())
    }

    async fn author_hymns(&self, author_id: Uuid) -> Result<Vec<HymnSummary>, RepoError> {
        let state = self.state.lock().await;
        let mut hymns: Vec<&HymnRecord> = state
            .approved()
            .filter(|hymn| state.hymn_authors.contains(&(hymn.id, author_id)))
            .collect();
        hymns.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(hymns.into_iter().map(|h| state.summary(h)).collect())
    }

    async fn list_categories(&self) -> Result<Vec<CategoryWithCount>, RepoError> {
        self.ensure_online()?;
        let state = self.state.lock().await;
        let mut categories: Vec<CategoryWithCount> = state
            .categories
            .iter()
            .map(|category| CategoryWithCount {
                category: category.clone(),
                hymn_count: state
                    .approved()
                    .filter(|hymn| state.hymn_categories.contains(&(hymn.id, category.id)))
                    .count() as u64,
            })
            .collect();
        categories.sort_by(|a, b| a.category.name.cmp(&b.category.name));
        Ok(categories)
    }

    async fn search_categories(
        &self,
        search: &str,
        page: PageRequest,
    ) -> Result<Paginated<CategoryRecord>, RepoError> {
        let state = self.state.lock().await;
        let needle = search.to_lowercase();
        let categories: Vec<CategoryRecord> = state
            .categories
            .iter()
            .filter(|category| category.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        Ok(paginate_slice(&categories, page))
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<CategoryRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn list_category_hymns(
        &self,
        category_id: Uuid,
        page: PageRequest,
    ) -> Result<Paginated<HymnSummary>, RepoError> {
        let state = self.state.lock().await;
        let mut hymns: Vec<&HymnRecord> = state
            .approved()
            .filter(|hymn| state.hymn_categories.contains(&(hymn.id, category_id)))
            .collect();
        hymns.sort_by(|a, b| a.title.cmp(&b.title));
        let summaries: Vec<HymnSummary> = hymns.into_iter().map(|h| state.summary(h)).collect();
        Ok(paginate_slice(&summaries, page))
    }
}

#[async_trait]
impl CatalogWriteRepo for MemoryRepos {
    async fn create_author(&self, draft: AuthorDraft) -> Result<AuthorRecord, RepoError> {
        let mut state = self.state.lock().await;
        let author = AuthorRecord {
            id: Uuid::new_v4(),
            name: draft.name,
            biography: draft.biography,
            birth_year: draft.birth_year,
            death_year: draft.death_year,
            created_at: state.tick(),
        };
        state.authors.push(author.clone());
        Ok(author)
    }

    async fn update_author(&self, id: Uuid, draft: AuthorDraft) -> Result<AuthorRecord, RepoError> {
        let mut state = self.state.lock().await;
        let author = state
            .authors
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(missing)?;
        author.name = draft.name;
        author.biography = draft.biography;
        author.birth_year = draft.birth_year;
        author.death_year = draft.death_year;
        Ok(author.clone())
    }

    async fn delete_author(&self, id: Uuid) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        state.authors.retain(|a| a.id != id);
        Ok(())
    }

    async fn count_author_links(&self, id: Uuid) -> Result<u64, RepoError> {
        let state = self.state.lock().await;
        Ok(state.hymn_authors.iter().filter(|(_, a)| *a == id).count() as u64)
    }

    async fn create_category(&self, draft: CategoryDraft) -> Result<CategoryRecord, RepoError> {
        let mut state = self.state.lock().await;
        if state.categories.iter().any(|c| c.name == draft.name) {
            return Err(RepoError::Duplicate {
                constraint: "categories_name_key".to_string(),
            });
        }
        let category = CategoryRecord {
            id: Uuid::new_v4(),
            name: draft.name,
            description: draft.description,
            created_at: state.tick(),
        };
        state.categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        id: Uuid,
        draft: CategoryDraft,
    ) -> Result<CategoryRecord, RepoError> {
        let mut state = self.state.lock().await;
        let category = state
            .categories
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(missing)?;
        category.name = draft.name;
        category.description = draft.description;
        Ok(category.clone())
    }

    async fn delete_category(&self, id: Uuid) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        state.categories.retain(|c| c.id != id);
        Ok(())
    }

    async fn count_category_links(&self, id: Uuid) -> Result<u64, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .hymn_categories
            .iter()
            .filter(|(_, c)| *c == id)
            .count() as u64)
    }
}

#[async_trait]
impl UsersRepo for MemoryRepos {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut state = self.state.lock().await;
        let user = UserRecord {
            id: Uuid::new_v4(),
            email: params.email,
            display_name: params.display_name,
            avatar_url: None,
            bio: None,
            role: params.role,
            theme: ThemePreference::System,
            reputation: 0,
            created_at: state.tick(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn update_profile(&self, id: Uuid, draft: ProfileDraft) -> Result<UserRecord, RepoError> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(missing)?;
        user.display_name = draft.display_name;
        user.bio = draft.bio;
        user.avatar_url = draft.avatar_url;
        Ok(user.clone())
    }

    async fn update_theme(
        &self,
        id: Uuid,
        theme: ThemePreference,
    ) -> Result<UserRecord, RepoError> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(missing)?;
        user.theme = theme;
        Ok(user.clone())
    }

    async fn adjust_reputation(&self, id: Uuid, delta: i32) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        if let Some(user) = state.users.iter_mut().find(|u| u.id == id) {
            user.reputation += delta;
        }
        Ok(())
    }

    async fn profile_stats(&self, id: Uuid) -> Result<ProfileStats, RepoError> {
        let state = self.state.lock().await;
        Ok(ProfileStats {
            favorites: state.favorites.iter().filter(|(u, _, _)| *u == id).count() as u64,
            posts: state.posts.iter().filter(|p| p.user_id == id).count() as u64,
            comments: state.comments.iter().filter(|c| c.user_id == id).count() as u64,
        })
    }

    async fn list_users(
        &self,
        filter: &UserQueryFilter,
        page: PageRequest,
    ) -> Result<Paginated<UserRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(paginate_slice(&state.filtered_users(filter), page))
    }

    async fn export_users(&self, filter: &UserQueryFilter) -> Result<Vec<UserRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.filtered_users(filter))
    }

    async fn set_role(&self, id: Uuid, role: UserRole) -> Result<UserRecord, RepoError> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(missing)?;
        user.role = role;
        Ok(user.clone())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        let before = state.users.len();
        state.users.retain(|u| u.id != id);
        if state.users.len() == before {
            return Err(missing());
        }
        Ok(())
    }

    async fn user_ids(&self, role: Option<UserRole>) -> Result<Vec<Uuid>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .filter(|u| role.is_none_or(|role| u.role == role))
            .map(|u| u.id)
            .collect())
    }

    async fn find_users_by_handles(&self, handles: &[String]) -> Result<Vec<UserRef>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .filter(|u| handles.contains(&mention_handle(&u.display_name)))
            .map(UserRef::from)
            .collect())
    }
}

#[async_trait]
impl SessionsRepo for MemoryRepos {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let mut state = self.state.lock().await;
        let record = SessionRecord {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            prefix: params.prefix,
            hashed_secret: params.hashed_secret,
            created_at: OffsetDateTime::now_utc(),
            expires_at: params.expires_at,
            revoked_at: None,
        };
        state.sessions.push(record.clone());
        Ok(record)
    }

    async fn find_session_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<SessionRecord>, RepoError> {
        self.ensure_online()?;
        let state = self.state.lock().await;
        Ok(state.sessions.iter().find(|s| s.prefix == prefix).cloned())
    }

    async fn revoke_session(
        &self,
        id: Uuid,
        revoked_at: OffsetDateTime,
    ) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        let session = state
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(missing)?;
        session.revoked_at.get_or_insert(revoked_at);
        Ok(())
    }
}

#[async_trait]
impl FavoritesRepo for MemoryRepos {
    async fn toggle_favorite(&self, user_id: Uuid, hymn_id: Uuid) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        let before = state.favorites.len();
        state
            .favorites
            .retain(|(u, h, _)| !(*u == user_id && *h == hymn_id));
        if state.favorites.len() < before {
            return Ok(false);
        }
        let now = state.tick();
        state.favorites.push((user_id, hymn_id, now));
        Ok(true)
    }

    async fn is_favorite(&self, user_id: Uuid, hymn_id: Uuid) -> Result<bool, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .favorites
            .iter()
            .any(|(u, h, _)| *u == user_id && *h == hymn_id))
    }

    async fn list_favorites(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Paginated<FavoriteRecord>, RepoError> {
        self.ensure_online()?;
        let state = self.state.lock().await;
        let mut favorites: Vec<FavoriteRecord> = state
            .favorites
            .iter()
            .filter(|(u, _, _)| *u == user_id)
            .filter_map(|(_, hymn_id, at)| {
                state
                    .hymns
                    .iter()
                    .find(|h| h.id == *hymn_id)
                    .map(|hymn| FavoriteRecord {
                        hymn: state.summary(hymn),
                        favorited_at: *at,
                    })
            })
            .collect();
        favorites.sort_by(|a, b| b.favorited_at.cmp(&a.favorited_at));
        Ok(paginate_slice(&favorites, page))
    }
}

#[async_trait]
impl ForumRepo for MemoryRepos {
    async fn list_posts(
        &self,
        filter: &ForumPostFilter,
        page: PageRequest,
    ) -> Result<Paginated<ForumPostSummary>, RepoError> {
        self.ensure_online()?;
        let state = self.state.lock().await;
        let needle = filter.search.as_deref().map(str::to_lowercase);
        let mut posts: Vec<ForumPostSummary> = state
            .posts
            .iter()
            .filter(|p| filter.user_id.is_none_or(|id| p.user_id == id))
            .filter(|p| filter.hymn_id.is_none_or(|id| p.hymn_id == Some(id)))
            .filter(|p| {
                needle.as_deref().is_none_or(|needle| {
                    p.title.to_lowercase().contains(needle)
                        || p.content.to_lowercase().contains(needle)
                })
            })
            .map(|p| state.post_summary(p))
            .filter(|s| {
                filter
                    .tag
                    .as_deref()
                    .is_none_or(|tag| s.tags.iter().any(|t| t.name == tag))
            })
            .collect();
        match filter.sort {
            ForumSort::Latest => posts.sort_by(|a, b| {
                b.is_pinned
                    .cmp(&a.is_pinned)
                    .then(b.created_at.cmp(&a.created_at))
            }),
            ForumSort::Popular => posts.sort_by(|a, b| {
                b.like_count
                    .cmp(&a.like_count)
                    .then(b.view_count.cmp(&a.view_count))
            }),
            ForumSort::Comments => posts.sort_by(|a, b| b.comment_count.cmp(&a.comment_count)),
        }
        Ok(paginate_slice(&posts, page))
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<ForumPostRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn post_summary(&self, id: Uuid) -> Result<Option<ForumPostSummary>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .posts
            .iter()
            .find(|p| p.id == id)
            .map(|p| state.post_summary(p)))
    }

    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<ForumCommentRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .map(|c| state.comment(c))
            .collect())
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<ForumCommentRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .comments
            .iter()
            .find(|c| c.id == id)
            .map(|c| state.comment(c)))
    }

    async fn has_liked(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        let state = self.state.lock().await;
        Ok(state.likes.contains(&(post_id, user_id)))
    }

    async fn is_bookmarked(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .bookmarks
            .iter()
            .any(|(p, u, _)| *p == post_id && *u == user_id))
    }

    async fn list_bookmarks(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Paginated<ForumPostSummary>, RepoError> {
        self.ensure_online()?;
        let state = self.state.lock().await;
        let mut marks: Vec<&(Uuid, Uuid, OffsetDateTime)> =
            state.bookmarks.iter().filter(|(_, u, _)| *u == user_id).collect();
        marks.sort_by(|a, b| b.2.cmp(&a.2));
        let posts: Vec<ForumPostSummary> = marks
            .into_iter()
            .filter_map(|(post_id, _, _)| state.posts.iter().find(|p| p.id == *post_id))
            .map(|p| state.post_summary(p))
            .collect();
        Ok(paginate_slice(&posts, page))
    }

    async fn increment_post_view(&self, id: Uuid) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        if let Some(post) = state.posts.iter_mut().find(|p| p.id == id) {
            post.view_count += 1;
        }
        Ok(())
    }

    async fn list_tags(&self) -> Result<Vec<TagWithCount>, RepoError> {
        let state = self.state.lock().await;
        let mut tags: Vec<TagWithCount> = Vec::new();
        for (_, tag) in &state.post_tags {
            match tags.iter_mut().find(|t| t.name == tag.name) {
                Some(existing) => existing.post_count += 1,
                None => tags.push(TagWithCount {
                    id: tag.id,
                    name: tag.name.clone(),
                    post_count: 1,
                }),
            }
        }
        tags.sort_by(|a, b| b.post_count.cmp(&a.post_count).then(a.name.cmp(&b.name)));
        Ok(tags)
    }
}

#[async_trait]
impl ForumWriteRepo for MemoryRepos {
    async fn create_post(
        &self,
        params: CreateForumPostParams,
    ) -> Result<ForumPostRecord, RepoError> {
        let mut state = self.state.lock().await;
        let now = state.tick();
        let post = ForumPostRecord {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            hymn_id: params.hymn_id,
            title: params.draft.title.clone(),
            content: params.draft.content.clone(),
            view_count: 0,
            is_pinned: false,
            is_featured: false,
            created_at: now,
            updated_at: now,
        };
        state.posts.push(post.clone());
        state.replace_tags(post.id, &params.draft);
        Ok(post)
    }

    async fn update_post(&self, id: Uuid, draft: PostDraft) -> Result<ForumPostRecord, RepoError> {
        let mut state = self.state.lock().await;
        let now = state.tick();
        let post = state
            .posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(missing)?;
        post.title = draft.title.clone();
        post.content = draft.content.clone();
        post.updated_at = now;
        let post = post.clone();
        state.replace_tags(id, &draft);
        Ok(post)
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        let before = state.posts.len();
        state.posts.retain(|p| p.id != id);
        if state.posts.len() == before {
            return Err(missing());
        }
        state.comments.retain(|c| c.post_id != id);
        state.likes.retain(|(p, _)| *p != id);
        state.bookmarks.retain(|(p, _, _)| *p != id);
        state.post_tags.retain(|(p, _)| *p != id);
        Ok(())
    }

    async fn add_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<ForumCommentRecord, RepoError> {
        let mut state = self.state.lock().await;
        let stored = StoredComment {
            id: Uuid::new_v4(),
            post_id: params.post_id,
            parent_id: params.parent_id,
            user_id: params.user_id,
            content: params.draft.content,
            created_at: state.tick(),
        };
        state.comments.push(stored.clone());
        Ok(state.comment(&stored))
    }

    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        let before = state.comments.len();
        state.comments.retain(|c| c.id != id);
        if state.comments.len() == before {
            return Err(missing());
        }
        Ok(())
    }

    async fn toggle_like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        if let Some(index) = state.likes.iter().position(|l| *l == (post_id, user_id)) {
            state.likes.remove(index);
            return Ok(false);
        }
        state.likes.push((post_id, user_id));
        Ok(true)
    }

    async fn toggle_comment_like(
        &self,
        comment_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        if let Some(index) = state
            .comment_likes
            .iter()
            .position(|l| *l == (comment_id, user_id))
        {
            state.comment_likes.remove(index);
            return Ok(false);
        }
        state.comment_likes.push((comment_id, user_id));
        Ok(true)
    }

    async fn toggle_bookmark(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        if let Some(index) = state
            .bookmarks
            .iter()
            .position(|(p, u, _)| *p == post_id && *u == user_id)
        {
            state.bookmarks.remove(index);
            return Ok(false);
        }
        let now = state.tick();
        state.bookmarks.push((post_id, user_id, now));
        Ok(true)
    }

    async fn set_featured(&self, id: Uuid, featured: bool) -> Result<ForumPostRecord, RepoError> {
        let mut state = self.state.lock().await;
        let post = state
            .posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(missing)?;
        post.is_featured = featured;
        Ok(post.clone())
    }
}

#[async_trait]
impl NotificationsRepo for MemoryRepos {
    async fn list_notifications(
        &self,
        user_id: Uuid,
        filter: &NotificationFilter,
        page: PageRequest,
    ) -> Result<Paginated<NotificationRecord>, RepoError> {
        self.ensure_online()?;
        let state = self.state.lock().await;
        let mut items: Vec<NotificationRecord> = state
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .filter(|n| !filter.unread_only || !n.is_read)
            .filter(|n| filter.kinds.is_empty() || filter.kinds.contains(&n.kind))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate_slice(&items, page))
    }

    async fn notification_counts(&self, user_id: Uuid) -> Result<(u64, u64), RepoError> {
        let state = self.state.lock().await;
        let mine = state.notifications.iter().filter(|n| n.user_id == user_id);
        let total = mine.clone().count() as u64;
        let unread = mine.filter(|n| !n.is_read).count() as u64;
        Ok((total, unread))
    }

    async fn mark_read(&self, user_id: Uuid, ids: Option<&[Uuid]>) -> Result<u64, RepoError> {
        let mut state = self.state.lock().await;
        let mut updated = 0;
        for notification in state
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .filter(|n| ids.is_none_or(|ids| ids.contains(&n.id)))
        {
            notification.is_read = true;
            updated += 1;
        }
        Ok(updated)
    }

    async fn create_notifications(&self, batch: Vec<NewNotification>) -> Result<u64, RepoError> {
        let mut state = self.state.lock().await;
        let count = batch.len() as u64;
        for item in batch {
            let created_at = state.tick();
            state.notifications.push(NotificationRecord {
                id: Uuid::new_v4(),
                user_id: item.user_id,
                actor_id: item.actor_id,
                kind: item.kind,
                title: item.draft.title,
                message: item.draft.message,
                link: item.draft.link,
                is_read: false,
                created_at,
            });
        }
        Ok(count)
    }
}

#[async_trait]
impl ReportsRepo for MemoryRepos {
    async fn create_report(&self, params: CreateReportParams) -> Result<ReportRecord, RepoError> {
        let mut state = self.state.lock().await;
        let now = state.tick();
        let report = ReportRecord {
            id: Uuid::new_v4(),
            reporter_id: params.reporter_id,
            target_kind: params.target_kind,
            target_id: params.target_id,
            reason: params.reason,
            status: ReportStatus::Pending,
            resolution_note: None,
            created_at: now,
            updated_at: now,
        };
        state.reports.push(report.clone());
        Ok(report)
    }

    async fn list_reports(
        &self,
        filter: &ReportQueryFilter,
        page: PageRequest,
    ) -> Result<Paginated<ReportRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut reports: Vec<ReportRecord> = state
            .reports
            .iter()
            .filter(|r| filter.status.is_none_or(|s| r.status == s))
            .filter(|r| filter.target_kind.is_none_or(|k| r.target_kind == k))
            .cloned()
            .collect();
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate_slice(&reports, page))
    }

    async fn find_report(&self, id: Uuid) -> Result<Option<ReportRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.reports.iter().find(|r| r.id == id).cloned())
    }

    async fn update_report_status(
        &self,
        id: Uuid,
        status: ReportStatus,
        note: Option<String>,
    ) -> Result<ReportRecord, RepoError> {
        let mut state = self.state.lock().await;
        let now = state.tick();
        let report = state
            .reports
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(missing)?;
        report.status = status;
        if note.is_some() {
            report.resolution_note = note;
        }
        report.updated_at = now;
        Ok(report.clone())
    }
}

#[async_trait]
impl DashboardRepo for MemoryRepos {
    async fn dashboard_stats(&self) -> Result<DashboardStats, RepoError> {
        let state = self.state.lock().await;
        let hymns_with = |status: HymnStatus| state.hymns.iter().filter(|h| h.status == status).count() as u64;
        Ok(DashboardStats {
            hymns_pending: hymns_with(HymnStatus::Pending),
            hymns_approved: hymns_with(HymnStatus::Approved),
            hymns_rejected: hymns_with(HymnStatus::Rejected),
            authors: state.authors.len() as u64,
            categories: state.categories.len() as u64,
            users: state.users.len() as u64,
            forum_posts: state.posts.len() as u64,
            open_reports: state
                .reports
                .iter()
                .filter(|r| !r.status.is_terminal())
                .count() as u64,
        })
    }
}

#[async_trait]
impl HealthRepo for MemoryRepos {
    async fn health_check(&self) -> Result<(), RepoError> {
        self.ensure_online()
    }
}

/// The services and router states wired over one [`MemoryRepos`].
pub struct TestApp {
    pub repos: Arc<MemoryRepos>,
    pub cache: QueryCache,
    pub api: ApiState,
    pub admin: AdminState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_cache(CacheConfig::default())
    }

    pub fn with_cache(config: CacheConfig) -> Self {
        let repos = MemoryRepos::new();
        let cache = QueryCache::new(config);
        let queries = cache.client.clone();
        let trigger = Some(cache.trigger.clone());

        let sessions = Arc::new(SessionService::new(repos.clone(), repos.clone()));
        let hymns = HymnService::new(
            repos.clone(),
            repos.clone(),
            repos.clone(),
            repos.clone(),
            queries.clone(),
        )
        .with_cache_trigger_opt(trigger.clone());
        let notifications = NotificationService::new(repos.clone(), repos.clone(), queries.clone())
            .with_cache_trigger_opt(trigger.clone());
        let forum = ForumService::new(
            repos.clone(),
            repos.clone(),
            repos.clone(),
            repos.clone(),
            notifications.clone(),
            queries.clone(),
        )
        .with_cache_trigger_opt(trigger.clone());
        let profile = ProfileService::new(repos.clone(), forum.clone(), queries.clone())
            .with_cache_trigger_opt(trigger.clone());
        let favorites = FavoritesService::new(repos.clone(), repos.clone(), queries.clone())
            .with_cache_trigger_opt(trigger.clone());
        let reports = Arc::new(
            ReportService::new(repos.clone(), queries.clone())
                .with_cache_trigger_opt(trigger.clone()),
        );
        let catalog = CatalogService::new(repos.clone(), queries.clone());
        let admin_hymns =
            AdminHymnService::new(repos.clone(), repos.clone(), repos.clone(), hymns.clone())
                .with_cache_trigger_opt(trigger.clone());
        let admin_catalog = AdminCatalogService::new(repos.clone(), repos.clone())
            .with_cache_trigger_opt(trigger.clone());
        let admin_users =
            AdminUserService::new(repos.clone(), queries.clone()).with_cache_trigger_opt(trigger);
        let dashboard = AdminDashboardService::new(repos.clone(), queries);

        let notifications = Arc::new(notifications);
        let forum = Arc::new(forum);

        let api = ApiState {
            site: SiteIdentity::new("Hymnary", "Test library"),
            sessions: sessions.clone(),
            hymns: Arc::new(hymns),
            catalog: Arc::new(catalog),
            favorites: Arc::new(favorites),
            forum: forum.clone(),
            notifications: notifications.clone(),
            profile: Arc::new(profile),
            reports: reports.clone(),
            health: repos.clone(),
        };
        let admin = AdminState {
            sessions,
            dashboard: Arc::new(dashboard),
            hymns: Arc::new(admin_hymns),
            catalog: Arc::new(admin_catalog),
            users: Arc::new(admin_users),
            notifications,
            reports,
            forum,
            health: repos.clone(),
        };

        Self {
            repos,
            cache,
            api,
            admin,
        }
    }

    /// Seeds a user and returns a bearer token for them.
    pub async fn sign_in(&self, name: &str, role: UserRole) -> (UserRecord, String) {
        let user = self.repos.seed_user(name, role).await;
        let issued = self
            .api
            .sessions
            .issue(user.id, Duration::hours(1))
            .await
            .expect("issue session");
        (user, issued.token)
    }

    pub async fn context(&self, token: &str) -> SessionContext {
        self.api
            .sessions
            .authenticate(token)
            .await
            .expect("authenticate")
    }
}
