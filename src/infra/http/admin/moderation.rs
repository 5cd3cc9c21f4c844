//! Reports, broadcasts and featured forum posts.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::application::repos::ReportQueryFilter;
use hymnary_api_types::{
    BroadcastRequest, BroadcastResponse, FeaturePostRequest, ReportStatusRequest, ToggleResponse,
};

use super::super::api::error::ApiError;
use super::super::api::middleware::CurrentSession;
use super::super::api::models::AdminReportListQuery;
use super::super::api::respond::loaded_listing;
use super::AdminState;

pub(super) async fn admin_reports(
    State(state): State<AdminState>,
    query: Result<Query<AdminReportListQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let page = query.page_request();
    let filter = ReportQueryFilter {
        status: query.status,
        target_kind: query.target_kind,
    };
    Ok(loaded_listing(state.reports.list(filter, page).await?))
}

pub(super) async fn admin_report_status(
    State(state): State<AdminState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
    payload: Result<Json<ReportStatusRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let report = state
        .reports
        .set_status(&session, id, payload.status, payload.note.as_deref())
        .await?;
    Ok(Json(report).into_response())
}

pub(super) async fn admin_broadcast(
    State(state): State<AdminState>,
    CurrentSession(session): CurrentSession,
    payload: Result<Json<BroadcastRequest>, JsonRejection>,
) -> Result<Json<BroadcastResponse>, ApiError> {
    let Json(payload) = payload?;
    let recipients = state
        .notifications
        .broadcast(
            &session,
            &payload.title,
            &payload.message,
            payload.link.as_deref(),
            payload.audience(),
        )
        .await?;
    Ok(Json(BroadcastResponse { recipients }))
}

pub(super) async fn admin_post_featured(
    State(state): State<AdminState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
    payload: Result<Json<FeaturePostRequest>, JsonRejection>,
) -> Result<Json<ToggleResponse>, ApiError> {
    let Json(payload) = payload?;
    let post = state
        .forum
        .feature_post(&session, id, payload.featured)
        .await?;
    Ok(Json(ToggleResponse {
        id,
        active: post.is_featured,
    }))
}
