use std::convert::Infallible;

use axum::body::Body;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Request, header::AUTHORIZATION};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, error};

use crate::application::session::{AuthError, SessionContext, SessionService};

use super::error::ApiError;

/// Resolves a bearer token into a [`SessionContext`] request extension.
///
/// Requests without a token pass through anonymously; a token that does not
/// authenticate is rejected outright rather than downgraded to anonymous.
pub async fn session_auth(
    State(sessions): State<std::sync::Arc<SessionService>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()) else {
        return next.run(request).await;
    };

    let session = match sessions.authenticate(&token).await {
        Ok(session) => session,
        Err(AuthError::Repo(err)) => {
            error!(target: "hymnary::http::session", error = %err, "Session lookup failed");
            return ApiError::from(err).into_response();
        }
        Err(err) => {
            debug!(target: "hymnary::http::session", error = %err, "Rejected session token");
            return ApiError::from(err).into_response();
        }
    };

    request.extensions_mut().insert(session.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(session);
    response
}

/// Gate for the administrative router: a signed-in administrator only.
pub async fn require_admin(request: Request<Body>, next: Next) -> Response {
    let Some(session) = request.extensions().get::<SessionContext>() else {
        return ApiError::unauthorized().into_response();
    };
    if let Err(err) = session.require_admin() {
        return ApiError::from(err).into_response();
    }
    next.run(request).await
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// The signed-in user; rejects anonymous requests with 401.
pub struct CurrentSession(pub SessionContext);

impl<S: Send + Sync> FromRequestParts<S> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionContext>()
            .cloned()
            .map(Self)
            .ok_or_else(ApiError::unauthorized)
    }
}

/// The signed-in user when there is one.
pub struct Viewer(pub Option<SessionContext>);

impl<S: Send + Sync> FromRequestParts<S> for Viewer {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<SessionContext>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_requires_scheme_and_value() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer hs_abc_def"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("hs_abc_def"));
    }
}
