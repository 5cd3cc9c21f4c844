use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::application::admin::HymnWriteCommand;
use crate::application::repos::NewMedia;
use hymnary_api_types::{HymnLinksRequest, HymnStatusRequest, HymnWriteRequest, MediaAttachRequest};

use super::super::api::error::ApiError;
use super::super::api::middleware::CurrentSession;
use super::super::api::models::AdminHymnListQuery;
use super::super::api::respond::loaded_listing;
use super::AdminState;

pub(super) async fn admin_hymns(
    State(state): State<AdminState>,
    query: Result<Query<AdminHymnListQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let page = query.page_request();
    Ok(loaded_listing(
        state.hymns.list(query.status, query.search, page).await?,
    ))
}

pub(super) async fn admin_hymn_create(
    State(state): State<AdminState>,
    CurrentSession(session): CurrentSession,
    payload: Result<Json<HymnWriteRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let hymn = state.hymns.create(&session, command(payload)).await?;
    Ok((StatusCode::CREATED, Json(hymn)).into_response())
}

pub(super) async fn admin_hymn_update(
    State(state): State<AdminState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
    payload: Result<Json<HymnWriteRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let hymn = state.hymns.update(&session, id, command(payload)).await?;
    Ok(Json(hymn).into_response())
}

pub(super) async fn admin_hymn_status(
    State(state): State<AdminState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
    payload: Result<Json<HymnStatusRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let hymn = state.hymns.set_status(&session, id, payload.status).await?;
    Ok(Json(hymn).into_response())
}

pub(super) async fn admin_hymn_delete(
    State(state): State<AdminState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.hymns.delete(&session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn admin_hymn_links(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<HymnLinksRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(payload) = payload?;
    state
        .hymns
        .set_links(id, payload.author_ids, payload.category_ids)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn admin_hymn_media_attach(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<MediaAttachRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let media = match payload {
        MediaAttachRequest::Pdf { url, description } => NewMedia::Pdf { url, description },
        MediaAttachRequest::Audio { url, title, pdf_id } => NewMedia::Audio { url, title, pdf_id },
        MediaAttachRequest::Video {
            url,
            source,
            pdf_id,
        } => NewMedia::Video {
            url,
            source,
            pdf_id,
        },
    };
    let record = state.hymns.attach_media(id, media).await?;
    Ok((StatusCode::CREATED, Json(record)).into_response())
}

pub(super) async fn admin_hymn_media_detach(
    State(state): State<AdminState>,
    Path((id, media_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    state.hymns.detach_media(id, media_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn command(payload: HymnWriteRequest) -> HymnWriteCommand {
    HymnWriteCommand {
        number: payload.number,
        title: payload.title,
        lyrics: payload.lyrics,
        status: payload.status,
        author_ids: payload.author_ids,
        category_ids: payload.category_ids,
    }
}
