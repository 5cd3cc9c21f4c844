use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use uuid::Uuid;

use crate::presentation::Breadcrumbs;

use super::super::error::ApiError;
use super::super::models::{AuthorListQuery, PageQuery};
use super::super::respond::{loaded_json, loaded_listing, loaded_page};
use super::super::state::ApiState;

pub async fn list_authors(
    State(state): State<ApiState>,
    query: Result<Query<AuthorListQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let page = query.page_request();
    let authors = state.catalog.list_authors(query.search, page).await?;
    Ok(loaded_listing(authors))
}

pub async fn author_detail(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let detail = state.catalog.author_detail(id).await?;
    let author = &detail.value.author;
    let chrome = state
        .site
        .chrome(Some(&author.name), author.biography.as_deref())
        .with_breadcrumbs(
            Breadcrumbs::home()
                .push("Authors", "/authors")
                .push(author.name.clone(), format!("/authors/{id}")),
        );
    Ok(loaded_page(chrome, detail))
}

pub async fn list_categories(State(state): State<ApiState>) -> Result<Response, ApiError> {
    Ok(loaded_json(state.catalog.list_categories().await?))
}

pub async fn category_detail(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let detail = state.catalog.category_detail(id, query.request()).await?;
    let category = &detail.value.category;
    let chrome = state
        .site
        .chrome(Some(&category.name), category.description.as_deref())
        .with_breadcrumbs(
            Breadcrumbs::home()
                .push("Categories", "/categories")
                .push(category.name.clone(), format!("/categories/{id}")),
        );
    Ok(loaded_page(chrome, detail))
}
