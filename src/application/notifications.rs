//! In-app notifications: the recipient's inbox plus the fan-out helpers used
//! by the forum and by administrative broadcasts.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use hymnary_api_types::BroadcastAudience;

use crate::application::pagination::{PageRequest, Paginated};
use crate::application::repos::{
    NewNotification, NotificationFilter, NotificationsRepo, RepoError, UsersRepo,
};
use crate::application::session::SessionContext;
use crate::cache::{CacheTrigger, Loaded, QueryClient, QueryError, QueryKey, Resource};
use crate::domain::entities::NotificationRecord;
use crate::domain::error::DomainError;
use crate::domain::types::{NotificationKind, NotificationTab};
use crate::domain::users::NotificationDraft;

#[derive(Debug, Error)]
pub enum NotificationsError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Query(#[from] QueryError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct NotificationCounts {
    pub total: u64,
    pub unread: u64,
}

#[derive(Clone)]
pub struct NotificationService {
    repo: Arc<dyn NotificationsRepo>,
    users: Arc<dyn UsersRepo>,
    queries: Arc<QueryClient>,
    cache_trigger: Option<Arc<CacheTrigger>>,
}

impl NotificationService {
    pub fn new(
        repo: Arc<dyn NotificationsRepo>,
        users: Arc<dyn UsersRepo>,
        queries: Arc<QueryClient>,
    ) -> Self {
        Self {
            repo,
            users,
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

    /// Lists the inbox. Tab and kind filters are applied by the query, so
    /// every page is a slice of the same filtered result.
    pub async fn list(
        &self,
        session: &SessionContext,
        tab: NotificationTab,
        kinds: Vec<NotificationKind>,
        page: PageRequest,
    ) -> Result<Loaded<Paginated<NotificationRecord>>, NotificationsError> {
        let user_id = session.user_id;
        let mut kinds = kinds;
        kinds.sort_by_key(|kind| kind.as_str());
        kinds.dedup();

        let kinds_param = kinds
            .iter()
            .map(|kind| kind.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let key = QueryKey::prefix(Resource::Notifications)
            .with("user", user_id)
            .with("tab", tab)
            .with_opt("kinds", (!kinds_param.is_empty()).then_some(kinds_param))
            .with("page", page.page())
            .with("page_size", page.page_size());

        let filter = NotificationFilter {
            unread_only: tab == NotificationTab::Unread,
            kinds,
        };
        let repo = self.repo.clone();
        let state = self
            .queries
            .fetch(key, move || async move {
                repo.list_notifications(user_id, &filter, page).await
            })
            .await;
        Ok(state.into_loaded()?)
    }

    pub async fn counts(
        &self,
        session: &SessionContext,
    ) -> Result<Loaded<NotificationCounts>, NotificationsError> {
        let user_id = session.user_id;
        let key = QueryKey::prefix(Resource::NotificationCounts).with("user", user_id);
        let repo = self.repo.clone();
        let state = self
            .queries
            .fetch(key, move || async move {
                let (total, unread) = repo.notification_counts(user_id).await?;
                Ok::<_, RepoError>(NotificationCounts { total, unread })
            })
            .await;
        Ok(state.into_loaded()?)
    }

    /// Marks the listed notifications, or all of them, as read. Returns the
    /// number of rows that changed.
    pub async fn mark_read(
        &self,
        session: &SessionContext,
        ids: Option<Vec<Uuid>>,
    ) -> Result<u64, NotificationsError> {
        if ids.as_ref().is_some_and(Vec::is_empty) {
            return Ok(0);
        }
        let updated = self
            .repo
            .mark_read(session.user_id, ids.as_deref())
            .await?;

        if updated > 0
            && let Some(trigger) = &self.cache_trigger
        {
            trigger.notifications_changed(session.user_id);
        }
        Ok(updated)
    }

    /// Sends one notification. Returns `false` without writing anything
    /// when the actor is the recipient.
    pub async fn notify(
        &self,
        recipient: Uuid,
        actor: Option<Uuid>,
        kind: NotificationKind,
        draft: NotificationDraft,
    ) -> Result<bool, NotificationsError> {
        if actor == Some(recipient) {
            debug!(
                target: "hymnary::application::notifications",
                user_id = %recipient,
                kind = %kind,
                "Skipping self notification"
            );
            return Ok(false);
        }

        self.repo
            .create_notifications(vec![NewNotification {
                user_id: recipient,
                actor_id: actor,
                kind,
                draft,
            }])
            .await?;

        if let Some(trigger) = &self.cache_trigger {
            trigger.notifications_changed(recipient);
        }
        Ok(true)
    }

    /// Creates one `system` notification per recipient in the audience,
    /// leaving out the sender.
    pub async fn broadcast(
        &self,
        actor: &SessionContext,
        title: &str,
        message: &str,
        link: Option<&str>,
        audience: BroadcastAudience,
    ) -> Result<u64, NotificationsError> {
        let draft = NotificationDraft::new(title, message, link)?;
        let role = match audience {
            BroadcastAudience::All => None,
            BroadcastAudience::Role(role) => Some(role),
        };
        let recipients = self.users.user_ids(role).await?;

        let batch: Vec<NewNotification> = recipients
            .into_iter()
            .filter(|user_id| *user_id != actor.user_id)
            .map(|user_id| NewNotification {
                user_id,
                actor_id: Some(actor.user_id),
                kind: NotificationKind::System,
                draft: draft.clone(),
            })
            .collect();
        let created = if batch.is_empty() {
            0
        } else {
            self.repo.create_notifications(batch).await?
        };

        info!(
            target: "hymnary::application::notifications",
            actor_id = %actor.user_id,
            audience = ?audience,
            recipients = created,
            "Broadcast sent"
        );

        if let Some(trigger) = &self.cache_trigger {
            trigger.notifications_broadcast();
        }
        Ok(created)
    }
}
