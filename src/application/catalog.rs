use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::application::hymns::normalize_search;
use crate::application::pagination::{PageRequest, Paginated};
use crate::application::repos::{CatalogRepo, RepoError};
use crate::cache::{Loaded, QueryClient, QueryError, QueryKey, Resource};
use crate::domain::entities::{
    AuthorDetail, AuthorRecord, CategoryRecord, CategoryWithCount, HymnSummary,
};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Query(#[from] QueryError),
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryDetail {
    pub category: CategoryRecord,
    pub hymns: Paginated<HymnSummary>,
}

/// Author and category reads.
#[derive(Clone)]
pub struct CatalogService {
    repo: Arc<dyn CatalogRepo>,
    queries: Arc<QueryClient>,
}

impl CatalogService {
    pub fn new(repo: Arc<dyn CatalogRepo>, queries: Arc<QueryClient>) -> Self {
        Self { repo, queries }
    }

    pub async fn list_authors(
        &self,
        search: Option<String>,
        page: PageRequest,
    ) -> Result<Loaded<Paginated<AuthorRecord>>, CatalogError> {
        let search = normalize_search(search);
        let key = QueryKey::prefix(Resource::Authors)
            .with_opt("search", search.as_deref())
            .with("page", page.page())
            .with("page_size", page.page_size());
        let repo = self.repo.clone();
        let state = self
            .queries
            .fetch(key, move || async move {
                repo.list_authors(search.as_deref(), page).await
            })
            .await;
        Ok(state.into_loaded()?)
    }

    /// The author with their approved hymns.
    pub async fn author_detail(&self, id: Uuid) -> Result<Loaded<AuthorDetail>, CatalogError> {
        let key = QueryKey::prefix(Resource::Author).with("id", id);
        let repo = self.repo.clone();
        let state = self
            .queries
            .fetch(key, move || async move {
                let Some(author) = repo.find_author(id).await? else {
                    return Ok::<_, RepoError>(None);
                };
                let hymns = repo.author_hymns(id).await?;
                Ok(Some(AuthorDetail { author, hymns }))
            })
            .await;

        state
            .into_loaded()?
            .transpose()
            .ok_or(CatalogError::NotFound("author"))
    }

    pub async fn list_categories(&self) -> Result<Loaded<Vec<CategoryWithCount>>, CatalogError> {
        let repo = self.repo.clone();
        let state = self
            .queries
            .fetch(QueryKey::prefix(Resource::Categories), move || async move {
                repo.list_categories().await
            })
            .await;
        Ok(state.into_loaded()?)
    }

    /// The category with one page of its approved hymns.
    pub async fn category_detail(
        &self,
        id: Uuid,
        page: PageRequest,
    ) -> Result<Loaded<CategoryDetail>, CatalogError> {
        let key = QueryKey::prefix(Resource::Category)
            .with("id", id)
            .with("page", page.page())
            .with("page_size", page.page_size());
        let repo = self.repo.clone();
        let state = self
            .queries
            .fetch(key, move || async move {
                let Some(category) = repo.find_category(id).await? else {
                    return Ok::<_, RepoError>(None);
                };
                let hymns = repo.list_category_hymns(id, page).await?;
                Ok(Some(CategoryDetail { category, hymns }))
            })
            .await;

        state
            .into_loaded()?
            .transpose()
            .ok_or(CatalogError::NotFound("category"))
    }
}
