use axum::{extract::State, response::Response};

use super::super::api::error::ApiError;
use super::super::api::respond::loaded_json;
use super::AdminState;

pub(super) async fn admin_dashboard(State(state): State<AdminState>) -> Result<Response, ApiError> {
    Ok(loaded_json(state.dashboard.overview().await?))
}
