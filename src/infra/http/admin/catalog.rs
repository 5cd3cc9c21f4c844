use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::application::admin::{AuthorCommand, CategoryCommand};
use hymnary_api_types::{AuthorWriteRequest, CategoryWriteRequest};

use super::super::api::error::ApiError;
use super::super::api::middleware::CurrentSession;
use super::AdminState;

fn author_command(payload: AuthorWriteRequest) -> AuthorCommand {
    AuthorCommand {
        name: payload.name,
        biography: payload.biography,
        birth_year: payload.birth_year,
        death_year: payload.death_year,
    }
}

fn category_command(payload: CategoryWriteRequest) -> CategoryCommand {
    CategoryCommand {
        name: payload.name,
        description: payload.description,
    }
}

pub(super) async fn admin_author_create(
    State(state): State<AdminState>,
    CurrentSession(session): CurrentSession,
    payload: Result<Json<AuthorWriteRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let author = state
        .catalog
        .create_author(&session, author_command(payload))
        .await?;
    Ok((StatusCode::CREATED, Json(author)).into_response())
}

pub(super) async fn admin_author_update(
    State(state): State<AdminState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
    payload: Result<Json<AuthorWriteRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let author = state
        .catalog
        .update_author(&session, id, author_command(payload))
        .await?;
    Ok(Json(author).into_response())
}

pub(super) async fn admin_author_delete(
    State(state): State<AdminState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.catalog.delete_author(&session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn admin_category_create(
    State(state): State<AdminState>,
    CurrentSession(session): CurrentSession,
    payload: Result<Json<CategoryWriteRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let category = state
        .catalog
        .create_category(&session, category_command(payload))
        .await?;
    Ok((StatusCode::CREATED, Json(category)).into_response())
}

pub(super) async fn admin_category_update(
    State(state): State<AdminState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
    payload: Result<Json<CategoryWriteRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let category = state
        .catalog
        .update_category(&session, id, category_command(payload))
        .await?;
    Ok(Json(category).into_response())
}

pub(super) async fn admin_category_delete(
    State(state): State<AdminState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.catalog.delete_category(&session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
