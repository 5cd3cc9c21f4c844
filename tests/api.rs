mod support;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use hymnary::cache::{QueryKey, Resource};
use hymnary::domain::types::{HymnStatus, UserRole};
use hymnary::infra::http::{STALE_HEADER, build_admin_router, build_api_router};

use support::TestApp;

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

#[tokio::test]
async fn health_reports_database_state() {
    let app = TestApp::new();
    let router = build_api_router(app.api.clone());

    let (status, body) = send(&router, request(Method::GET, "/api/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    app.repos.set_offline(true);
    let (status, body) = send(&router, request(Method::GET, "/api/health", None, None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["database"], "timeout");
}

#[tokio::test]
async fn request_id_is_echoed() {
    let app = TestApp::new();
    let router = build_api_router(app.api.clone());

    let mut req = request(Method::GET, "/api/health", None, None);
    req.headers_mut()
        .insert("x-request-id", "trace-123".parse().expect("header"));
    let response = router.oneshot(req).await.expect("response");
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("trace-123")
    );
}

#[tokio::test]
async fn personal_routes_require_a_session() {
    let app = TestApp::new();
    let router = build_api_router(app.api.clone());

    let (status, body) = send(&router, request(Method::GET, "/api/me", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let (status, _) = send(
        &router,
        request(Method::GET, "/api/hymns", Some("hs_bogus_token"), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signed_out_tokens_stop_working() {
    let app = TestApp::new();
    let router = build_api_router(app.api.clone());
    let (_, token) = app.sign_in("Anna", UserRole::User).await;

    let (status, body) = send(&router, request(Method::GET, "/api/me", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["display_name"], "Anna");

    let (status, _) = send(
        &router,
        request(Method::DELETE, "/api/session", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&router, request(Method::GET, "/api/me", Some(&token), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "session_revoked");
}

#[tokio::test]
async fn hymn_page_carries_breadcrumbs_and_stale_flag() {
    let app = TestApp::new();
    let router = build_api_router(app.api.clone());
    let hymn = app.repos.seed_hymn("Veni Creator", HymnStatus::Approved).await;
    let uri = format!("/api/hymns/{}", hymn.id);

    let response = router
        .clone()
        .oneshot(request(Method::GET, &uri, None, None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(STALE_HEADER).is_none());
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let body: Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(body["page"]["meta"]["title"], "Veni Creator | Hymnary");
    assert_eq!(body["page"]["breadcrumbs"].as_array().map(Vec::len), Some(3));
    assert_eq!(body["data"]["title"], "Veni Creator");

    app.cache.client.invalidate(&QueryKey::prefix(Resource::Hymn));
    app.repos.set_offline(true);

    let response = router
        .clone()
        .oneshot(request(Method::GET, &uri, None, None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(STALE_HEADER)
            .and_then(|v| v.to_str().ok()),
        Some("1")
    );
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let body: Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(body["alerts"][0]["kind"], "warning");
}

#[tokio::test]
async fn favorites_round_trip_over_http() {
    let app = TestApp::new();
    let router = build_api_router(app.api.clone());
    let (_, token) = app.sign_in("Anna", UserRole::User).await;
    let hymn = app.repos.seed_hymn("Regina Caeli", HymnStatus::Approved).await;
    let toggle = format!("/api/me/favorites/{}", hymn.id);

    let (status, body) = send(&router, request(Method::POST, &toggle, Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], true);

    let (_, body) = send(
        &router,
        request(Method::GET, "/api/me/favorites", Some(&token), None),
    )
    .await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["hymn"]["title"], "Regina Caeli");

    let (_, body) = send(&router, request(Method::POST, &toggle, Some(&token), None)).await;
    assert_eq!(body["active"], false);
}

#[tokio::test]
async fn session_store_outage_is_not_a_bad_token() {
    let app = TestApp::new();
    let router = build_api_router(app.api.clone());
    let (_, token) = app.sign_in("Anna", UserRole::User).await;

    app.repos.set_offline(true);
    let (status, body) = send(&router, request(Method::GET, "/api/me", Some(&token), None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "db_timeout");

    app.repos.set_offline(false);
    let (status, _) = send(&router, request(Method::GET, "/api/me", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn bookmarks_and_comment_likes_over_http() {
    let app = TestApp::new();
    let router = build_api_router(app.api.clone());
    let (_, anna) = app.sign_in("Anna", UserRole::User).await;
    let (_, paul) = app.sign_in("Paul", UserRole::User).await;

    let (_, post) = send(
        &router,
        request(
            Method::POST,
            "/api/forum/posts",
            Some(&anna),
            Some(json!({ "title": "Pentecost", "content": "Veni Sancte Spiritus" })),
        ),
    )
    .await;
    let post_id = post["id"].as_str().expect("post id").to_string();

    let (status, comment) = send(
        &router,
        request(
            Method::POST,
            &format!("/api/forum/posts/{post_id}/comments"),
            Some(&paul),
            Some(json!({ "content": "Sung before the Gospel" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let comment_id = comment["id"].as_str().expect("comment id").to_string();

    let (status, body) = send(
        &router,
        request(
            Method::POST,
            &format!("/api/forum/comments/{comment_id}/like"),
            Some(&anna),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], true);

    let (_, body) = send(
        &router,
        request(
            Method::POST,
            &format!("/api/forum/posts/{post_id}/bookmark"),
            Some(&paul),
            None,
        ),
    )
    .await;
    assert_eq!(body["active"], true);

    let (status, body) = send(
        &router,
        request(Method::GET, "/api/me/bookmarks", Some(&paul), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["title"], "Pentecost");

    let (_, detail) = send(
        &router,
        request(
            Method::GET,
            &format!("/api/forum/posts/{post_id}"),
            Some(&paul),
            None,
        ),
    )
    .await;
    assert_eq!(detail["data"]["bookmarked_by_viewer"], true);
    assert_eq!(detail["data"]["comments"][0]["like_count"], 1);

    let (status, _) = send(&router, request(Method::GET, "/api/me/bookmarks", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn forum_validation_errors_are_reported() {
    let app = TestApp::new();
    let router = build_api_router(app.api.clone());
    let (_, token) = app.sign_in("Anna", UserRole::User).await;

    let (status, body) = send(
        &router,
        request(
            Method::POST,
            "/api/forum/posts",
            Some(&token),
            Some(json!({ "title": "   ", "content": "Body" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_failed");

    let (status, body) = send(
        &router,
        request(
            Method::POST,
            "/api/forum/posts",
            Some(&token),
            Some(json!({ "title": "Easter", "content": "Alleluia", "tags": ["Easter"] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["title"], "Easter");

    let (_, body) = send(&router, request(Method::GET, "/api/forum/tags", None, None)).await;
    assert_eq!(body[0]["name"], "easter");
}

#[tokio::test]
async fn admin_routes_require_admin_role() {
    let app = TestApp::new();
    let router = build_admin_router(app.admin.clone());
    let (_, user_token) = app.sign_in("Anna", UserRole::User).await;
    let (_, admin_token) = app.sign_in("Admin", UserRole::Admin).await;

    let (status, _) = send(&router, request(Method::GET, "/admin/dashboard", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &router,
        request(Method::GET, "/admin/dashboard", Some(&user_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "forbidden");

    let (status, body) = send(
        &router,
        request(Method::GET, "/admin/dashboard", Some(&admin_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"], 2);
}

#[tokio::test]
async fn admin_creates_and_approves_hymns() {
    let app = TestApp::new();
    let admin_router = build_admin_router(app.admin.clone());
    let api_router = build_api_router(app.api.clone());
    let (_, token) = app.sign_in("Admin", UserRole::Admin).await;

    let (status, created) = send(
        &admin_router,
        request(
            Method::POST,
            "/admin/hymns",
            Some(&token),
            Some(json!({ "title": "Tantum Ergo", "lyrics": "Tantum ergo sacramentum" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "pending");
    let id = created["id"].as_str().expect("id").to_string();

    let (status, queue) = send(
        &admin_router,
        request(Method::GET, "/admin/hymns?status=pending", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queue["total"], 1);
    assert_eq!(queue["items"][0]["id"], id.as_str());

    let (_, listed) = send(&api_router, request(Method::GET, "/api/hymns", None, None)).await;
    assert_eq!(listed["total"], 0);

    let (status, approved) = send(
        &admin_router,
        request(
            Method::PUT,
            &format!("/admin/hymns/{id}/status"),
            Some(&token),
            Some(json!({ "status": "approved" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "approved");

    let (_, listed) = send(&api_router, request(Method::GET, "/api/hymns", None, None)).await;
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["items"][0]["title"], "Tantum Ergo");

    let (_, queue) = send(
        &admin_router,
        request(Method::GET, "/admin/hymns?status=pending", Some(&token), None),
    )
    .await;
    assert_eq!(queue["total"], 0);
    let (_, approved) = send(
        &admin_router,
        request(Method::GET, "/admin/hymns?status=approved", Some(&token), None),
    )
    .await;
    assert_eq!(approved["total"], 1);
    assert_eq!(approved["items"][0]["id"], id.as_str());
}

#[tokio::test]
async fn admins_cannot_demote_themselves() {
    let app = TestApp::new();
    let router = build_admin_router(app.admin.clone());
    let (admin, token) = app.sign_in("Admin", UserRole::Admin).await;

    let (status, body) = send(
        &router,
        request(
            Method::PUT,
            &format!("/admin/users/{}/role", admin.id),
            Some(&token),
            Some(json!({ "role": "user" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");
}

#[tokio::test]
async fn user_export_is_csv() {
    let app = TestApp::new();
    let router = build_admin_router(app.admin.clone());
    let (_, token) = app.sign_in("Admin", UserRole::Admin).await;
    app.repos.seed_user("Anna", UserRole::User).await;

    let response = router
        .oneshot(request(
            Method::GET,
            "/admin/users/export.csv",
            Some(&token),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/csv"))
    );
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let csv = String::from_utf8(bytes.to_vec()).expect("utf8");
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.contains("anna@example.org"));
}
