//! Handlers for the public JSON API, one module per area.

pub mod catalog;
pub mod forum;
pub mod hymns;
pub mod me;
pub mod reports;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;

use super::error::ApiError;
use super::middleware::bearer_token;
use super::state::ApiState;

pub async fn health(State(state): State<ApiState>) -> Response {
    crate::infra::http::db_health_response(state.health.as_ref()).await
}

/// Signs the caller out by revoking the session behind their token.
pub async fn end_session(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = bearer_token(&headers).ok_or_else(ApiError::unauthorized)?;
    state.sessions.end(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}
