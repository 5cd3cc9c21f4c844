use std::sync::Arc;

use thiserror::Error;

use crate::application::repos::{DashboardRepo, RepoError};
use crate::cache::{Loaded, QueryClient, QueryError, QueryKey, Resource};
use crate::domain::entities::DashboardStats;

#[derive(Debug, Error)]
pub enum AdminDashboardError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Query(#[from] QueryError),
}

#[derive(Clone)]
pub struct AdminDashboardService {
    repo: Arc<dyn DashboardRepo>,
    queries: Arc<QueryClient>,
}

impl AdminDashboardService {
    pub fn new(repo: Arc<dyn DashboardRepo>, queries: Arc<QueryClient>) -> Self {
        Self { repo, queries }
    }

    /// Hymns by status, users, forum posts and open reports.
    pub async fn overview(&self) -> Result<Loaded<DashboardStats>, AdminDashboardError> {
        let repo = self.repo.clone();
        let state = self
            .queries
            .fetch(QueryKey::prefix(Resource::Dashboard), move || async move {
                repo.dashboard_stats().await
            })
            .await;
        Ok(state.into_loaded()?)
    }
}
