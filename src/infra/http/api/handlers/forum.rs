use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::application::forum::PostInput;
use crate::application::repos::ForumPostFilter;
use crate::presentation::Breadcrumbs;
use hymnary_api_types::{
    CommentCreateRequest, ForumPostCreateRequest, ForumPostUpdateRequest, ToggleResponse,
};

use super::super::error::ApiError;
use super::super::middleware::{CurrentSession, Viewer};
use super::super::models::ForumListQuery;
use super::super::respond::{loaded_json, loaded_listing, loaded_page};
use super::super::state::ApiState;

pub async fn list_posts(
    State(state): State<ApiState>,
    query: Result<Query<ForumListQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let page = query.page_request();
    let filter = ForumPostFilter {
        search: query.search,
        tag: query.tag,
        hymn_id: query.hymn_id,
        user_id: query.user_id,
        sort: query.sort,
    };
    Ok(loaded_listing(state.forum.list_posts(filter, page).await?))
}

pub async fn post_detail(
    State(state): State<ApiState>,
    Viewer(viewer): Viewer,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let detail = state.forum.post_detail(id, viewer.as_ref()).await?;
    let title = detail.value.summary.title.clone();
    let chrome = state
        .site
        .chrome(Some(&title), None)
        .with_breadcrumbs(
            Breadcrumbs::home()
                .push("Forum", "/forum")
                .push(title, format!("/forum/posts/{id}")),
        );
    Ok(loaded_page(chrome, detail))
}

pub async fn create_post(
    State(state): State<ApiState>,
    CurrentSession(session): CurrentSession,
    payload: Result<Json<ForumPostCreateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let post = state
        .forum
        .create_post(
            &session,
            PostInput {
                title: payload.title,
                content: payload.content,
                hymn_id: payload.hymn_id,
                tags: payload.tags,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(post)).into_response())
}

pub async fn update_post(
    State(state): State<ApiState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
    payload: Result<Json<ForumPostUpdateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let post = state
        .forum
        .update_post(&session, id, &payload.title, &payload.content, &payload.tags)
        .await?;
    Ok(Json(post).into_response())
}

pub async fn delete_post(
    State(state): State<ApiState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.forum.delete_post(&session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_comment(
    State(state): State<ApiState>,
    CurrentSession(session): CurrentSession,
    Path(post_id): Path<Uuid>,
    payload: Result<Json<CommentCreateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let comment = state
        .forum
        .add_comment(&session, post_id, &payload.content, payload.parent_id)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)).into_response())
}

pub async fn delete_comment(
    State(state): State<ApiState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.forum.delete_comment(&session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_like(
    State(state): State<ApiState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> Result<Json<ToggleResponse>, ApiError> {
    let active = state.forum.toggle_like(&session, id).await?;
    Ok(Json(ToggleResponse { id, active }))
}

pub async fn toggle_comment_like(
    State(state): State<ApiState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> Result<Json<ToggleResponse>, ApiError> {
    let active = state.forum.toggle_comment_like(&session, id).await?;
    Ok(Json(ToggleResponse { id, active }))
}

pub async fn toggle_bookmark(
    State(state): State<ApiState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> Result<Json<ToggleResponse>, ApiError> {
    let active = state.forum.toggle_bookmark(&session, id).await?;
    Ok(Json(ToggleResponse { id, active }))
}

pub async fn list_tags(State(state): State<ApiState>) -> Result<Response, ApiError> {
    Ok(loaded_json(state.forum.list_tags().await?))
}
