//! Public catalog reads: hymn listings, the composed hymn page, view
//! counting and global search.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::application::pagination::{PageRequest, Paginated};
use crate::application::repos::{
    CatalogRepo, FavoritesRepo, ForumPostFilter, ForumRepo, HymnQueryFilter, HymnsRepo, RepoError,
};
use crate::application::session::{SessionContext, viewer_key};
use crate::cache::{CacheTrigger, Loaded, QueryClient, QueryError, QueryKey, Resource};
use crate::domain::entities::{
    AuthorRecord, AuthorRef, CategoryRecord, CategoryRef, ForumPostSummary, HymnMedia, HymnRecord,
    HymnSummary, SearchHit, SearchHitKind,
};
use crate::domain::hymns::RELATED_HYMNS_LIMIT;
use crate::domain::types::{HymnSort, HymnStatus, SearchKind, SortDirection};
use crate::media::Playlist;

const HYMN_FORUM_POSTS_LIMIT: u32 = 10;

#[derive(Debug, Error)]
pub enum HymnServiceError {
    #[error("hymn not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Listing parameters accepted from the public surface.
#[derive(Debug, Clone, Default)]
pub struct HymnListQuery {
    pub search: Option<String>,
    pub author_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub sort: HymnSort,
    pub direction: Option<SortDirection>,
}

impl HymnListQuery {
    /// Public listings only ever show approved hymns.
    pub fn into_filter(self) -> HymnQueryFilter {
        HymnQueryFilter {
            status: Some(HymnStatus::Approved),
            search: normalize_search(self.search),
            author_id: self.author_id,
            category_id: self.category_id,
            sort: self.sort,
            direction: self.direction,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HymnDetail {
    #[serde(flatten)]
    pub hymn: HymnRecord,
    pub authors: Vec<AuthorRef>,
    pub categories: Vec<CategoryRef>,
    pub media: HymnMedia,
    pub playlist: Playlist,
    pub related: Vec<HymnSummary>,
    pub forum_posts: Vec<ForumPostSummary>,
    pub is_favorite: bool,
}

#[derive(Clone)]
pub struct HymnService {
    hymns: Arc<dyn HymnsRepo>,
    catalog: Arc<dyn CatalogRepo>,
    forum: Arc<dyn ForumRepo>,
    favorites: Arc<dyn FavoritesRepo>,
    queries: Arc<QueryClient>,
    cache_trigger: Option<Arc<CacheTrigger>>,
}

impl HymnService {
    pub fn new(
        hymns: Arc<dyn HymnsRepo>,
        catalog: Arc<dyn CatalogRepo>,
        forum: Arc<dyn ForumRepo>,
        favorites: Arc<dyn FavoritesRepo>,
        queries: Arc<QueryClient>,
    ) -> Self {
        Self {
            hymns,
            catalog,
            forum,
            favorites,
            queries,
            cache_trigger: None,
        }
    }

    pub fn with_cache_trigger(mut self, trigger: Arc<CacheTrigger>) -> Self {
        self.cache_trigger = Some(trigger);
        self
    }

    pub fn with_cache_trigger_opt(mut self, trigger: Option<Arc<CacheTrigger>>) -> Self {
        self.cache_trigger = trigger;
        self
    }

    pub async fn list(
        &self,
        query: HymnListQuery,
        page: PageRequest,
    ) -> Result<Loaded<Paginated<HymnSummary>>, HymnServiceError> {
        self.list_filtered(query.into_filter(), page).await
    }

    /// Listing with an arbitrary status filter; the admin surface passes
    /// `status: None` to see every hymn.
    pub async fn list_filtered(
        &self,
        filter: HymnQueryFilter,
        page: PageRequest,
    ) -> Result<Loaded<Paginated<HymnSummary>>, HymnServiceError> {
        let key = hymns_key(&filter, page);
        let repo = self.hymns.clone();
        let state = self
            .queries
            .fetch(key, move || async move { repo.list_hymns(&filter, page).await })
            .await;
        Ok(state.into_loaded()?)
    }

    /// The hymn page. Hymns that are not approved are only visible to
    /// moderators.
    pub async fn detail(
        &self,
        id: Uuid,
        session: Option<&SessionContext>,
    ) -> Result<Loaded<HymnDetail>, HymnServiceError> {
        let staff = session.is_some_and(SessionContext::is_moderator);
        let viewer = session.map(|s| s.user_id);
        let key = QueryKey::prefix(Resource::Hymn)
            .with("id", id)
            .with("viewer", viewer_key(session))
            .with("scope", if staff { "staff" } else { "public" });

        let hymns = self.hymns.clone();
        let forum = self.forum.clone();
        let favorites = self.favorites.clone();
        let state = self
            .queries
            .fetch(key, move || async move {
                load_detail(hymns, forum, favorites, id, viewer, staff).await
            })
            .await;

        state
            .into_loaded()?
            .transpose()
            .ok_or(HymnServiceError::NotFound)
    }

    /// Counts a view. Failures are logged and otherwise ignored.
    pub async fn record_view(&self, id: Uuid) {
        match self.hymns.increment_view(id, OffsetDateTime::now_utc()).await {
            Ok(()) => {
                if let Some(trigger) = &self.cache_trigger {
                    trigger.hymn_viewed(id);
                }
            }
            Err(err) => {
                warn!(
                    target: "hymnary::application::hymns",
                    hymn_id = %id,
                    error = %err,
                    "Failed to record hymn view"
                );
            }
        }
    }

    /// Searches hymns, authors and categories. An empty query matches
    /// nothing.
    pub async fn search(
        &self,
        query: &str,
        kind: SearchKind,
        page: PageRequest,
    ) -> Result<Loaded<Paginated<SearchHit>>, HymnServiceError> {
        let Some(term) = normalize_search(Some(query.to_string())) else {
            return Ok(Loaded::fresh(Paginated::empty(page)));
        };

        let key = QueryKey::prefix(Resource::Search)
            .with("q", &term)
            .with("kind", kind)
            .with("page", page.page())
            .with("page_size", page.page_size());
        let hymns = self.hymns.clone();
        let catalog = self.catalog.clone();
        let state = self
            .queries
            .fetch(key, move || async move {
                run_search(hymns, catalog, term, kind, page).await
            })
            .await;
        Ok(state.into_loaded()?)
    }
}

pub(crate) fn hymns_key(filter: &HymnQueryFilter, page: PageRequest) -> QueryKey {
    QueryKey::prefix(Resource::Hymns)
        .with("sort", filter.sort)
        .with("direction", filter.effective_direction())
        .with("status", filter.status.map_or("any", HymnStatus::as_str))
        .with_opt("search", filter.search.as_deref())
        .with_opt("author", filter.author_id)
        .with_opt("category", filter.category_id)
        .with("page", page.page())
        .with("page_size", page.page_size())
}

pub(crate) fn normalize_search(search: Option<String>) -> Option<String> {
    search
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

async fn load_detail(
    hymns: Arc<dyn HymnsRepo>,
    forum: Arc<dyn ForumRepo>,
    favorites: Arc<dyn FavoritesRepo>,
    id: Uuid,
    viewer: Option<Uuid>,
    staff: bool,
) -> Result<Option<HymnDetail>, RepoError> {
    let Some(hymn) = hymns.find_hymn(id).await? else {
        return Ok(None);
    };
    if hymn.status != HymnStatus::Approved && !staff {
        return Ok(None);
    }

    let post_filter = ForumPostFilter {
        hymn_id: Some(id),
        ..ForumPostFilter::default()
    };
    let (authors, categories, media, related, posts) = tokio::try_join!(
        hymns.hymn_authors(id),
        hymns.hymn_categories(id),
        hymns.hymn_media(id),
        related_hymns(hymns.as_ref(), id),
        forum.list_posts(&post_filter, PageRequest::first(HYMN_FORUM_POSTS_LIMIT)),
    )?;

    let is_favorite = match viewer {
        Some(user_id) => favorites.is_favorite(user_id, id).await?,
        None => false,
    };
    let playlist = Playlist::from_media(&hymn.title, &media);

    Ok(Some(HymnDetail {
        hymn,
        authors,
        categories,
        media,
        playlist,
        related,
        forum_posts: posts.items,
        is_favorite,
    }))
}

/// Hymns sharing an author or category, topped up with the most viewed
/// hymns when there are fewer than the limit. Never contains `id` itself.
async fn related_hymns(hymns: &dyn HymnsRepo, id: Uuid) -> Result<Vec<HymnSummary>, RepoError> {
    let mut related = hymns.hymns_sharing_links(id, RELATED_HYMNS_LIMIT).await?;
    related.retain(|hymn| hymn.id != id);
    related.truncate(RELATED_HYMNS_LIMIT);

    if related.len() < RELATED_HYMNS_LIMIT {
        let mut exclude: Vec<Uuid> = related.iter().map(|hymn| hymn.id).collect();
        exclude.push(id);
        let fill = hymns
            .most_viewed_hymns(&exclude, RELATED_HYMNS_LIMIT - related.len())
            .await?;
        related.extend(fill.into_iter().filter(|hymn| !exclude.contains(&hymn.id)));
        related.truncate(RELATED_HYMNS_LIMIT);
    }

    Ok(related)
}

async fn run_search(
    hymns: Arc<dyn HymnsRepo>,
    catalog: Arc<dyn CatalogRepo>,
    term: String,
    kind: SearchKind,
    page: PageRequest,
) -> Result<Paginated<SearchHit>, RepoError> {
    let hymn_filter = HymnQueryFilter {
        search: Some(term.clone()),
        ..HymnQueryFilter::approved()
    };

    match kind {
        SearchKind::Hymns => Ok(hymns.list_hymns(&hymn_filter, page).await?.map(hymn_hit)),
        SearchKind::Authors => Ok(catalog
            .list_authors(Some(&term), page)
            .await?
            .map(author_hit)),
        SearchKind::Categories => Ok(catalog
            .search_categories(&term, page)
            .await?
            .map(category_hit)),
        SearchKind::All => {
            // Hymns, then authors, then categories, as one ordered result set.
            let count_only = PageRequest::first(1);
            let (hymn_total, author_total, category_total) = tokio::try_join!(
                hymns.list_hymns(&hymn_filter, count_only),
                catalog.list_authors(Some(&term), count_only),
                catalog.search_categories(&term, count_only),
            )?;
            let (hymn_total, author_total, category_total) =
                (hymn_total.total, author_total.total, category_total.total);
            let total = hymn_total + author_total + category_total;

            let start = page.offset().min(total);
            let end = start.saturating_add(page.limit()).min(total);
            let size = page.page_size();
            let authors_from = hymn_total;
            let categories_from = hymn_total + author_total;

            let mut hits: Vec<SearchHit> = read_range(
                start.min(authors_from),
                end.min(authors_from),
                size,
                |request| hymns.list_hymns(&hymn_filter, request),
            )
            .await?
            .into_iter()
            .map(hymn_hit)
            .collect();
            hits.extend(
                read_range(
                    start.clamp(authors_from, categories_from) - authors_from,
                    end.clamp(authors_from, categories_from) - authors_from,
                    size,
                    |request| catalog.list_authors(Some(&term), request),
                )
                .await?
                .into_iter()
                .map(author_hit),
            );
            hits.extend(
                read_range(
                    start.max(categories_from) - categories_from,
                    end.max(categories_from) - categories_from,
                    size,
                    |request| catalog.search_categories(&term, request),
                )
                .await?
                .into_iter()
                .map(category_hit),
            );
            Ok(Paginated::new(hits, total, page))
        }
    }
}

/// Reads rows `start..end` of one result set through requests of
/// `page_size`, touching at most two pages when the range straddles a
/// page boundary.
async fn read_range<T, F, Fut>(
    start: u64,
    end: u64,
    page_size: u32,
    fetch: F,
) -> Result<Vec<T>, RepoError>
where
    F: Fn(PageRequest) -> Fut,
    Fut: Future<Output = Result<Paginated<T>, RepoError>>,
{
    if start >= end {
        return Ok(Vec::new());
    }
    let size = u64::from(page_size.max(1));
    let first = start / size;
    let last = (end - 1) / size;

    let mut rows = Vec::new();
    for index in first..=last {
        let number = u32::try_from(index + 1).unwrap_or(u32::MAX);
        rows.extend(fetch(PageRequest::new(number, page_size)).await?.items);
    }
    let skip = usize::try_from(start - first * size).unwrap_or(usize::MAX);
    let take = usize::try_from(end - start).unwrap_or(usize::MAX);
    Ok(rows.into_iter().skip(skip).take(take).collect())
}

fn hymn_hit(hymn: HymnSummary) -> SearchHit {
    let authors = hymn
        .authors
        .iter()
        .map(|author| author.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    SearchHit {
        kind: SearchHitKind::Hymn,
        id: hymn.id,
        path: format!("/hymns/{}", hymn.id),
        title: hymn.title,
        excerpt: (!authors.is_empty()).then_some(authors),
    }
}

fn author_hit(author: AuthorRecord) -> SearchHit {
    SearchHit {
        kind: SearchHitKind::Author,
        id: author.id,
        path: format!("/authors/{}", author.id),
        title: author.name,
        excerpt: author.biography.map(|bio| excerpt(&bio)),
    }
}

fn category_hit(category: CategoryRecord) -> SearchHit {
    SearchHit {
        kind: SearchHitKind::Category,
        id: category.id,
        path: format!("/categories/{}", category.id),
        title: category.name,
        excerpt: category.description.map(|text| excerpt(&text)),
    }
}

fn excerpt(text: &str) -> String {
    const EXCERPT_CHARS: usize = 100;
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head.trim_end())
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_forces_approved_status() {
        let filter = HymnListQuery {
            search: Some("  ".to_string()),
            ..HymnListQuery::default()
        }
        .into_filter();
        assert_eq!(filter.status, Some(HymnStatus::Approved));
        assert_eq!(filter.search, None);
    }

    #[tokio::test]
    async fn read_range_spans_page_boundaries() {
        let rows: Vec<u32> = (0..25).collect();
        let fetch = |request: PageRequest| {
            let page = crate::application::pagination::paginate_slice(&rows, request);
            async move { Ok::<_, RepoError>(page) }
        };

        assert_eq!(
            read_range(8, 13, 5, &fetch).await.expect("range"),
            vec![8, 9, 10, 11, 12]
        );
        assert_eq!(
            read_range(22, 25, 10, &fetch).await.expect("range"),
            vec![22, 23, 24]
        );
        assert!(read_range(7, 7, 5, &fetch).await.expect("range").is_empty());
    }

    #[test]
    fn list_keys_start_with_the_sort() {
        let filter = HymnQueryFilter {
            sort: HymnSort::Views,
            ..HymnQueryFilter::approved()
        };
        let key = hymns_key(&filter, PageRequest::default());
        assert!(key.starts_with(&QueryKey::prefix(Resource::Hymns).with("sort", "views")));
        assert_eq!(
            key.to_string(),
            "hymns:sort=views:direction=desc:status=approved:page=1:page_size=20"
        );
    }

    #[test]
    fn excerpts_are_cut_at_a_char_boundary() {
        let text = "é".repeat(150);
        let cut = excerpt(&text);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 103);
        assert_eq!(excerpt("short"), "short");
    }
}
