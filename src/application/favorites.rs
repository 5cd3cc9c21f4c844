use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::pagination::{PageRequest, Paginated};
use crate::application::repos::{FavoritesRepo, HymnsRepo, RepoError};
use crate::application::session::SessionContext;
use crate::cache::{CacheTrigger, Loaded, QueryClient, QueryError, QueryKey, Resource};
use crate::domain::entities::FavoriteRecord;
use crate::domain::types::HymnStatus;

#[derive(Debug, Error)]
pub enum FavoritesError {
    #[error("hymn not found")]
    HymnNotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Query(#[from] QueryError),
}

#[derive(Clone)]
pub struct FavoritesService {
    favorites: Arc<dyn FavoritesRepo>,
    hymns: Arc<dyn HymnsRepo>,
    queries: Arc<QueryClient>,
    cache_trigger: Option<Arc<CacheTrigger>>,
}

impl FavoritesService {
    pub fn new(
        favorites: Arc<dyn FavoritesRepo>,
        hymns: Arc<dyn HymnsRepo>,
        queries: Arc<QueryClient>,
    ) -> Self {
        Self {
            favorites,
            hymns,
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

    /// Flips the favorite flag and returns the new state. Only approved
    /// hymns can be added; an existing favorite can always be removed, even
    /// after its hymn left the approved state.
    pub async fn toggle(
        &self,
        session: &SessionContext,
        hymn_id: Uuid,
    ) -> Result<bool, FavoritesError> {
        let already = self
            .favorites
            .is_favorite(session.user_id, hymn_id)
            .await?;
        if !already {
            self.hymns
                .find_hymn(hymn_id)
                .await?
                .filter(|hymn| hymn.status == HymnStatus::Approved)
                .ok_or(FavoritesError::HymnNotFound)?;
        }

        let favorited = self
            .favorites
            .toggle_favorite(session.user_id, hymn_id)
            .await?;

        info!(
            target: "hymnary::application::favorites",
            user_id = %session.user_id,
            hymn_id = %hymn_id,
            favorited,
            "Favorite toggled"
        );

        if let Some(trigger) = &self.cache_trigger {
            trigger.favorite_toggled(session.user_id, hymn_id);
        }

        Ok(favorited)
    }

    /// The user's favorites, newest first.
    pub async fn list(
        &self,
        session: &SessionContext,
        page: PageRequest,
    ) -> Result<Loaded<Paginated<FavoriteRecord>>, FavoritesError> {
        let user_id = session.user_id;
        let key = QueryKey::prefix(Resource::Favorites)
            .with("user", user_id)
            .with("page", page.page())
            .with("page_size", page.page_size());
        let repo = self.favorites.clone();
        let state = self
            .queries
            .fetch(key, move || async move {
                repo.list_favorites(user_id, page).await
            })
            .await;
        Ok(state.into_loaded()?)
    }

    pub async fn is_favorite(
        &self,
        session: &SessionContext,
        hymn_id: Uuid,
    ) -> Result<bool, FavoritesError> {
        Ok(self
            .favorites
            .is_favorite(session.user_id, hymn_id)
            .await?)
    }
}
