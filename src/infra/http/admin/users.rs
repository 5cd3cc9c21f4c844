use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::application::repos::UserQueryFilter;
use hymnary_api_types::UserRoleRequest;

use super::super::api::error::ApiError;
use super::super::api::middleware::CurrentSession;
use super::super::api::models::AdminUserListQuery;
use super::super::api::respond::loaded_listing;
use super::AdminState;

pub(super) async fn admin_users(
    State(state): State<AdminState>,
    query: Result<Query<AdminUserListQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let page = query.page_request();
    let filter = UserQueryFilter {
        search: query.search,
        role: query.role,
    };
    Ok(loaded_listing(state.users.list(filter, page).await?))
}

pub(super) async fn admin_users_export(
    State(state): State<AdminState>,
    query: Result<Query<AdminUserListQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let csv = state
        .users
        .export_csv(UserQueryFilter {
            search: query.search,
            role: query.role,
        })
        .await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"users.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}

pub(super) async fn admin_user_role(
    State(state): State<AdminState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
    payload: Result<Json<UserRoleRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let user = state.users.set_role(&session, id, payload.role).await?;
    Ok(Json(user).into_response())
}

pub(super) async fn admin_user_delete(
    State(state): State<AdminState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.users.delete(&session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
