use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use hymnary_api_types::ReportSubmitRequest;

use super::super::error::ApiError;
use super::super::middleware::CurrentSession;
use super::super::state::ApiState;

pub async fn submit_report(
    State(state): State<ApiState>,
    CurrentSession(session): CurrentSession,
    payload: Result<Json<ReportSubmitRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let report = state
        .reports
        .submit(
            &session,
            payload.target_kind,
            payload.target_id,
            &payload.reason,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(report)).into_response())
}
