mod catalog;
mod dashboard;
mod health;
mod hymns;
mod moderation;
mod state;
mod users;

pub use state::AdminState;

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};

use super::api::middleware::{require_admin, session_auth};
use super::middleware::{log_responses, set_request_context};

/// Administrative JSON surface. Every route requires an administrator
/// session; it is served on its own listener.
pub fn build_admin_router(state: AdminState) -> Router {
    let sessions = state.sessions.clone();

    let guarded = Router::new()
        .route("/admin/dashboard", get(dashboard::admin_dashboard))
        .route("/admin/users", get(users::admin_users))
        .route("/admin/users/export.csv", get(users::admin_users_export))
        .route("/admin/users/{id}", delete(users::admin_user_delete))
        .route("/admin/users/{id}/role", put(users::admin_user_role))
        .route(
            "/admin/hymns",
            get(hymns::admin_hymns).post(hymns::admin_hymn_create),
        )
        .route(
            "/admin/hymns/{id}",
            put(hymns::admin_hymn_update).delete(hymns::admin_hymn_delete),
        )
        .route("/admin/hymns/{id}/status", put(hymns::admin_hymn_status))
        .route("/admin/hymns/{id}/links", put(hymns::admin_hymn_links))
        .route(
            "/admin/hymns/{id}/media",
            post(hymns::admin_hymn_media_attach),
        )
        .route(
            "/admin/hymns/{id}/media/{media_id}",
            delete(hymns::admin_hymn_media_detach),
        )
        .route("/admin/authors", post(catalog::admin_author_create))
        .route(
            "/admin/authors/{id}",
            put(catalog::admin_author_update).delete(catalog::admin_author_delete),
        )
        .route("/admin/categories", post(catalog::admin_category_create))
        .route(
            "/admin/categories/{id}",
            put(catalog::admin_category_update).delete(catalog::admin_category_delete),
        )
        .route("/admin/notifications", post(moderation::admin_broadcast))
        .route("/admin/reports", get(moderation::admin_reports))
        .route(
            "/admin/reports/{id}/status",
            put(moderation::admin_report_status),
        )
        .route(
            "/admin/forum/posts/{id}/featured",
            put(moderation::admin_post_featured),
        )
        .route_layer(middleware::from_fn(require_admin));

    Router::new()
        .route("/admin/_health/db", get(health::admin_health))
        .merge(guarded)
        .with_state(state)
        .layer(middleware::from_fn_with_state(sessions, session_auth))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}
