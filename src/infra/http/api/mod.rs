pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod respond;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};

use crate::infra::http::middleware::{log_responses, set_request_context};

use handlers::{catalog, forum, hymns, me, reports};

pub fn build_api_router(state: ApiState) -> Router {
    let sessions = state.sessions.clone();

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/hymns", get(hymns::list_hymns))
        .route("/api/hymns/{id}", get(hymns::hymn_detail))
        .route("/api/search", get(hymns::search))
        .route("/api/authors", get(catalog::list_authors))
        .route("/api/authors/{id}", get(catalog::author_detail))
        .route("/api/categories", get(catalog::list_categories))
        .route("/api/categories/{id}", get(catalog::category_detail))
        .route(
            "/api/forum/posts",
            get(forum::list_posts).post(forum::create_post),
        )
        .route(
            "/api/forum/posts/{id}",
            get(forum::post_detail)
                .patch(forum::update_post)
                .delete(forum::delete_post),
        )
        .route("/api/forum/posts/{id}/comments", post(forum::add_comment))
        .route("/api/forum/posts/{id}/like", post(forum::toggle_like))
        .route("/api/forum/posts/{id}/bookmark", post(forum::toggle_bookmark))
        .route("/api/forum/comments/{id}", delete(forum::delete_comment))
        .route("/api/forum/comments/{id}/like", post(forum::toggle_comment_like))
        .route("/api/forum/tags", get(forum::list_tags))
        .route("/api/users/{id}/posts", get(me::user_posts))
        .route("/api/me", get(me::profile).patch(me::update_profile))
        .route("/api/me/settings", put(me::update_settings))
        .route("/api/me/favorites", get(me::list_favorites))
        .route("/api/me/favorites/{hymn_id}", post(me::toggle_favorite))
        .route("/api/me/bookmarks", get(me::list_bookmarks))
        .route("/api/me/notifications", get(me::list_notifications))
        .route(
            "/api/me/notifications/counts",
            get(me::notification_counts),
        )
        .route(
            "/api/me/notifications/read",
            post(me::mark_notifications_read),
        )
        .route("/api/reports", post(reports::submit_report))
        .route("/api/session", delete(handlers::end_session))
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(
            sessions,
            middleware::session_auth,
        ))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
