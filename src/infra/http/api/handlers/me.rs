//! Endpoints scoped to the signed-in user.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use hymnary_api_types::{
    MarkReadRequest, MarkReadResponse, ProfileUpdateRequest, SettingsUpdateRequest,
    ToggleResponse,
};

use super::super::error::ApiError;
use super::super::middleware::CurrentSession;
use super::super::models::{NotificationListQuery, PageQuery};
use super::super::respond::{loaded_json, loaded_listing};
use super::super::state::ApiState;

pub async fn profile(
    State(state): State<ApiState>,
    CurrentSession(session): CurrentSession,
) -> Result<Response, ApiError> {
    Ok(loaded_json(state.profile.me(&session).await?))
}

pub async fn update_profile(
    State(state): State<ApiState>,
    CurrentSession(session): CurrentSession,
    payload: Result<Json<ProfileUpdateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let user = state
        .profile
        .update_profile(
            &session,
            &payload.display_name,
            payload.bio.as_deref(),
            payload.avatar_url.as_deref(),
        )
        .await?;
    Ok(Json(user).into_response())
}

pub async fn update_settings(
    State(state): State<ApiState>,
    CurrentSession(session): CurrentSession,
    payload: Result<Json<SettingsUpdateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let user = state
        .profile
        .update_settings(&session, payload.theme)
        .await?;
    Ok(Json(user).into_response())
}

pub async fn user_posts(
    State(state): State<ApiState>,
    Path(user_id): Path<Uuid>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    Ok(loaded_listing(
        state.profile.user_posts(user_id, query.request()).await?,
    ))
}

pub async fn list_favorites(
    State(state): State<ApiState>,
    CurrentSession(session): CurrentSession,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    Ok(loaded_listing(
        state.favorites.list(&session, query.request()).await?,
    ))
}

pub async fn toggle_favorite(
    State(state): State<ApiState>,
    CurrentSession(session): CurrentSession,
    Path(hymn_id): Path<Uuid>,
) -> Result<Json<ToggleResponse>, ApiError> {
    let active = state.favorites.toggle(&session, hymn_id).await?;
    Ok(Json(ToggleResponse {
        id: hymn_id,
        active,
    }))
}

pub async fn list_bookmarks(
    State(state): State<ApiState>,
    CurrentSession(session): CurrentSession,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    Ok(loaded_listing(
        state.forum.list_bookmarks(&session, query.request()).await?,
    ))
}

pub async fn list_notifications(
    State(state): State<ApiState>,
    CurrentSession(session): CurrentSession,
    query: Result<Query<NotificationListQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let kinds = query
        .kinds()
        .map_err(|err| ApiError::bad_request("Unknown notification kind", Some(err.to_string())))?;
    let page = query.page_request();
    let notifications = state
        .notifications
        .list(&session, query.tab, kinds, page)
        .await?;
    Ok(loaded_listing(notifications))
}

pub async fn notification_counts(
    State(state): State<ApiState>,
    CurrentSession(session): CurrentSession,
) -> Result<Response, ApiError> {
    Ok(loaded_json(state.notifications.counts(&session).await?))
}

/// Marks the listed notifications read; an empty body marks them all.
pub async fn mark_notifications_read(
    State(state): State<ApiState>,
    CurrentSession(session): CurrentSession,
    payload: Option<Json<MarkReadRequest>>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    let ids = payload.and_then(|Json(request)| request.ids);
    let updated = state.notifications.mark_read(&session, ids).await?;
    Ok(Json(MarkReadResponse { updated }))
}
