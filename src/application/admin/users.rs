use std::fmt::Write as _;
use std::sync::Arc;

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use tracing::info;
use uuid::Uuid;

use crate::application::hymns::normalize_search;
use crate::application::pagination::{PageRequest, Paginated};
use crate::application::repos::{RepoError, UserQueryFilter, UsersRepo};
use crate::application::session::SessionContext;
use crate::cache::{CacheTrigger, Loaded, QueryClient, QueryError, QueryKey, Resource};
use crate::domain::entities::UserRecord;
use crate::domain::types::UserRole;

const CSV_HEADER: &str = "id,email,display_name,role,reputation,created_at";

#[derive(Debug, Error)]
pub enum AdminUserError {
    #[error("user not found")]
    NotFound,
    #[error("administrators cannot change their own role or delete themselves")]
    SelfModification,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Query(#[from] QueryError),
}

#[derive(Clone)]
pub struct AdminUserService {
    users: Arc<dyn UsersRepo>,
    queries: Arc<QueryClient>,
    cache_trigger: Option<Arc<CacheTrigger>>,
}

impl AdminUserService {
    pub fn new(users: Arc<dyn UsersRepo>, queries: Arc<QueryClient>) -> Self {
        Self {
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

    /// Users matching `search` on email or display name.
    pub async fn list(
        &self,
        filter: UserQueryFilter,
        page: PageRequest,
    ) -> Result<Loaded<Paginated<UserRecord>>, AdminUserError> {
        let filter = UserQueryFilter {
            search: normalize_search(filter.search),
            ..filter
        };
        let key = QueryKey::prefix(Resource::AdminUsers)
            .with_opt("search", filter.search.as_deref())
            .with_opt("role", filter.role)
            .with("page", page.page())
            .with("page_size", page.page_size());
        let users = self.users.clone();
        let state = self
            .queries
            .fetch(key, move || async move {
                users.list_users(&filter, page).await
            })
            .await;
        Ok(state.into_loaded()?)
    }

    pub async fn set_role(
        &self,
        actor: &SessionContext,
        id: Uuid,
        role: UserRole,
    ) -> Result<UserRecord, AdminUserError> {
        if actor.user_id == id {
            return Err(AdminUserError::SelfModification);
        }
        let current = self
            .users
            .find_user(id)
            .await?
            .ok_or(AdminUserError::NotFound)?;
        if current.role == role {
            return Ok(current);
        }

        let user = self.users.set_role(id, role).await?;
        info!(
            target: "hymnary::application::admin::users",
            user_id = %id,
            from = %current.role,
            to = %role,
            actor_id = %actor.user_id,
            "User role changed"
        );
        if let Some(trigger) = &self.cache_trigger {
            trigger.user_role_changed(id);
        }
        Ok(user)
    }

    pub async fn delete(&self, actor: &SessionContext, id: Uuid) -> Result<(), AdminUserError> {
        if actor.user_id == id {
            return Err(AdminUserError::SelfModification);
        }
        self.users
            .find_user(id)
            .await?
            .ok_or(AdminUserError::NotFound)?;
        self.users.delete_user(id).await?;

        info!(
            target: "hymnary::application::admin::users",
            user_id = %id,
            actor_id = %actor.user_id,
            "User deleted"
        );
        if let Some(trigger) = &self.cache_trigger {
            trigger.user_deleted(id);
        }
        Ok(())
    }

    /// Every user matching the filter as CSV, header first.
    pub async fn export_csv(&self, filter: UserQueryFilter) -> Result<String, AdminUserError> {
        let filter = UserQueryFilter {
            search: normalize_search(filter.search),
            ..filter
        };
        let users = self.users.export_users(&filter).await?;
        Ok(render_csv(&users))
    }
}

fn render_csv(users: &[UserRecord]) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + users.len() * 96);
    out.push_str(CSV_HEADER);
    out.push('\n');
    for user in users {
        let created_at = user
            .created_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| user.created_at.unix_timestamp().to_string());
        let _ = writeln!(
            out,
            "{},{},{},{},{},{}",
            user.id,
            csv_field(&user.email),
            csv_field(&user.display_name),
            user.role,
            user.reputation,
            created_at
        );
    }
    out
}

/// Quotes a field when it contains a delimiter, quote or line break, and
/// neutralizes leading characters spreadsheets treat as formulas.
fn csv_field(value: &str) -> String {
    let value = if value.starts_with(['=', '+', '-', '@']) {
        format!("'{value}")
    } else {
        value.to_string()
    };
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value
    }
}
