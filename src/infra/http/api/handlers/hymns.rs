use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use uuid::Uuid;

use crate::application::hymns::HymnListQuery as ListQuery;
use crate::presentation::Breadcrumbs;

use super::super::error::ApiError;
use super::super::middleware::Viewer;
use super::super::models::{HymnListQuery, SearchQuery};
use super::super::respond::{loaded_listing, loaded_page};
use super::super::state::ApiState;

pub async fn list_hymns(
    State(state): State<ApiState>,
    query: Result<Query<HymnListQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let page = query.page_request();
    let hymns = state
        .hymns
        .list(
            ListQuery {
                search: query.search,
                author_id: query.author_id,
                category_id: query.category_id,
                sort: query.sort,
                direction: query.direction,
            },
            page,
        )
        .await?;
    Ok(loaded_listing(hymns))
}

/// The hymn page. Every successful read counts as a view.
pub async fn hymn_detail(
    State(state): State<ApiState>,
    Viewer(viewer): Viewer,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let detail = state.hymns.detail(id, viewer.as_ref()).await?;
    state.hymns.record_view(id).await;

    let title = detail.value.hymn.title.clone();
    let chrome = state
        .site
        .chrome(Some(&title), None)
        .with_breadcrumbs(
            Breadcrumbs::home()
                .push("Hymns", "/hymns")
                .push(title, format!("/hymns/{id}")),
        );
    Ok(loaded_page(chrome, detail))
}

pub async fn search(
    State(state): State<ApiState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let hits = state
        .hymns
        .search(&query.q, query.kind, query.page_request())
        .await?;
    Ok(loaded_listing(hits))
}
