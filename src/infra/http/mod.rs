mod admin;
pub mod api;
mod middleware;

pub use admin::{AdminState, build_admin_router};
pub use api::{ApiState, build_api_router};
pub use middleware::{RequestContext, STALE_HEADER};

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::application::error::ErrorReport;
use crate::application::repos::{HealthRepo, RepoError};
use hymnary_api_types::HealthResponse;

/// Pings the database; 200 with a small body when reachable, 503 otherwise.
async fn db_health_response(repo: &dyn HealthRepo) -> Response {
    match repo.health_check().await {
        Ok(()) => Json(HealthResponse {
            status: "ok".to_string(),
            database: "reachable".to_string(),
        })
        .into_response(),
        Err(err) => {
            let body = HealthResponse {
                status: "degraded".to_string(),
                database: unavailable_reason(&err).to_string(),
            };
            let mut response = (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

fn unavailable_reason(err: &RepoError) -> &'static str {
    match err {
        RepoError::Timeout => "timeout",
        _ => "unreachable",
    }
}
