//! Content reports and their moderation workflow.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::pagination::{PageRequest, Paginated};
use crate::application::repos::{CreateReportParams, RepoError, ReportQueryFilter, ReportsRepo};
use crate::application::session::SessionContext;
use crate::cache::{CacheTrigger, Loaded, QueryClient, QueryError, QueryKey, Resource};
use crate::domain::entities::ReportRecord;
use crate::domain::error::DomainError;
use crate::domain::types::{ReportStatus, ReportTarget};
use crate::domain::users::validate_report_reason;

const MAX_NOTE_CHARS: usize = 1_000;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report not found")]
    NotFound,
    #[error("moderator role required")]
    Forbidden,
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Query(#[from] QueryError),
}

#[derive(Clone)]
pub struct ReportService {
    repo: Arc<dyn ReportsRepo>,
    queries: Arc<QueryClient>,
    cache_trigger: Option<Arc<CacheTrigger>>,
}

impl ReportService {
    pub fn new(repo: Arc<dyn ReportsRepo>, queries: Arc<QueryClient>) -> Self {
        Self {
            repo,
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

    pub async fn submit(
        &self,
        session: &SessionContext,
        target_kind: ReportTarget,
        target_id: Uuid,
        reason: &str,
    ) -> Result<ReportRecord, ReportError> {
        let reason = validate_report_reason(reason)?;
        let report = self
            .repo
            .create_report(CreateReportParams {
                reporter_id: session.user_id,
                target_kind,
                target_id,
                reason,
            })
            .await?;

        info!(
            target: "hymnary::application::reports",
            report_id = %report.id,
            target_kind = %target_kind,
            target_id = %target_id,
            "Report submitted"
        );
        if let Some(trigger) = &self.cache_trigger {
            trigger.report_changed(report.id);
        }
        Ok(report)
    }

    pub async fn list(
        &self,
        filter: ReportQueryFilter,
        page: PageRequest,
    ) -> Result<Loaded<Paginated<ReportRecord>>, ReportError> {
        let key = QueryKey::prefix(Resource::AdminReports)
            .with_opt("status", filter.status)
            .with_opt("target", filter.target_kind)
            .with("page", page.page())
            .with("page_size", page.page_size());
        let repo = self.repo.clone();
        let state = self
            .queries
            .fetch(key, move || async move {
                repo.list_reports(&filter, page).await
            })
            .await;
        Ok(state.into_loaded()?)
    }

    /// Moves a report along its workflow: pending to reviewing, resolved or
    /// dismissed; reviewing to resolved or dismissed. Closed reports stay
    /// closed.
    pub async fn set_status(
        &self,
        session: &SessionContext,
        id: Uuid,
        status: ReportStatus,
        note: Option<&str>,
    ) -> Result<ReportRecord, ReportError> {
        if !session.is_moderator() {
            return Err(ReportError::Forbidden);
        }
        let report = self
            .repo
            .find_report(id)
            .await?
            .ok_or(ReportError::NotFound)?;
        if !report.status.can_transition_to(status) {
            return Err(DomainError::InvalidTransition {
                from: report.status,
                to: status,
            }
            .into());
        }

        let note = note.map(str::trim).filter(|note| !note.is_empty());
        if let Some(note) = note
            && note.chars().count() > MAX_NOTE_CHARS
        {
            return Err(DomainError::validation(format!(
                "resolution note must be at most {MAX_NOTE_CHARS} characters"
            ))
            .into());
        }

        let updated = self
            .repo
            .update_report_status(id, status, note.map(str::to_string))
            .await?;

        info!(
            target: "hymnary::application::reports",
            report_id = %id,
            from = %report.status,
            to = %status,
            actor_id = %session.user_id,
            "Report status changed"
        );
        if let Some(trigger) = &self.cache_trigger {
            trigger.report_changed(id);
        }
        Ok(updated)
    }
}
