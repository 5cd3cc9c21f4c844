use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::forum::{ForumError, ForumService};
use crate::application::pagination::{PageRequest, Paginated};
use crate::application::repos::{ForumPostFilter, RepoError, UsersRepo};
use crate::application::session::SessionContext;
use crate::cache::{CacheTrigger, Loaded, QueryClient, QueryError, QueryKey, Resource};
use crate::domain::entities::{ForumPostSummary, ProfileView, UserRecord};
use crate::domain::error::DomainError;
use crate::domain::types::ThemePreference;
use crate::domain::users::ProfileDraft;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Forum(#[from] ForumError),
}

#[derive(Clone)]
pub struct ProfileService {
    users: Arc<dyn UsersRepo>,
    forum: ForumService,
    queries: Arc<QueryClient>,
    cache_trigger: Option<Arc<CacheTrigger>>,
}

impl ProfileService {
    pub fn new(users: Arc<dyn UsersRepo>, forum: ForumService, queries: Arc<QueryClient>) -> Self {
        Self {
            users,
            forum,
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

    /// The signed-in user's profile with activity counts.
    pub async fn me(&self, session: &SessionContext) -> Result<Loaded<ProfileView>, ProfileError> {
        let user_id = session.user_id;
        let key = QueryKey::prefix(Resource::Profile).with("user", user_id);
        let users = self.users.clone();
        let state = self
            .queries
            .fetch(key, move || async move {
                let Some(user) = users.find_user(user_id).await? else {
                    return Ok::<_, RepoError>(None);
                };
                let stats = users.profile_stats(user_id).await?;
                Ok(Some(ProfileView { user, stats }))
            })
            .await;

        state
            .into_loaded()?
            .transpose()
            .ok_or(ProfileError::NotFound)
    }

    pub async fn update_profile(
        &self,
        session: &SessionContext,
        display_name: &str,
        bio: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<UserRecord, ProfileError> {
        let draft = ProfileDraft::new(display_name, bio, avatar_url)?;
        let user = self.users.update_profile(session.user_id, draft).await?;

        info!(
            target: "hymnary::application::profile",
            user_id = %user.id,
            "Profile updated"
        );
        if let Some(trigger) = &self.cache_trigger {
            trigger.profile_updated(user.id);
        }
        Ok(user)
    }

    pub async fn update_settings(
        &self,
        session: &SessionContext,
        theme: ThemePreference,
    ) -> Result<UserRecord, ProfileError> {
        let user = self.users.update_theme(session.user_id, theme).await?;
        if let Some(trigger) = &self.cache_trigger {
            trigger.profile_updated(user.id);
        }
        Ok(user)
    }

    /// Posts written by `user_id`, newest first.
    pub async fn user_posts(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Loaded<Paginated<ForumPostSummary>>, ProfileError> {
        let filter = ForumPostFilter {
            user_id: Some(user_id),
            ..ForumPostFilter::default()
        };
        Ok(self.forum.list_posts(filter, page).await?)
    }
}
