use crate::application::admin::{
    AdminCatalogError, AdminDashboardError, AdminHymnError, AdminUserError,
};
use crate::application::catalog::CatalogError;
use crate::application::error::ErrorReport;
use crate::application::favorites::FavoritesError;
use crate::application::forum::ForumError;
use crate::application::hymns::HymnServiceError;
use crate::application::notifications::NotificationsError;
use crate::application::profile::ProfileError;
use crate::application::reports::ReportError;
use crate::application::repos::RepoError;
use crate::application::session::{AuthError, SessionError};
use crate::cache::QueryError;
use crate::domain::error::DomainError;
use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const SESSION_EXPIRED: &str = "session_expired";
    pub const SESSION_REVOKED: &str = "session_revoked";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "not_found";
    pub const VALIDATION: &str = "validation_failed";
    pub const CONFLICT: &str = "conflict";
    pub const IN_USE: &str = "in_use";
    pub const INVALID_TRANSITION: &str = "invalid_transition";
    pub const DUPLICATE: &str = "duplicate";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const INTEGRITY: &str = "integrity_error";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const REPO: &str = "repo_error";
    pub const QUERY: &str = "query_failed";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Sign-in required",
            None,
        )
    }

    pub fn forbidden(hint: Option<String>) -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            codes::FORBIDDEN,
            "Not allowed for this account",
            hint,
        )
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    fn validation(message: String) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::VALIDATION,
            "Validation failed",
            Some(message),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let hint = self.hint.clone();
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message(
            "infra::http::api",
            self.status,
            format!("{}: {}", self.code, hint.as_deref().unwrap_or(self.message)),
        )
        .attach(&mut response);
        response
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request("Malformed request body", Some(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request("Malformed query string", Some(rejection.body_text()))
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate { constraint } => ApiError::new(
                StatusCode::CONFLICT,
                codes::DUPLICATE,
                "Duplicate record",
                Some(constraint),
            ),
            RepoError::NotFound => ApiError::not_found("Resource not found"),
            RepoError::InvalidInput { message } => ApiError::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_INPUT,
                "Invalid input",
                Some(message),
            ),
            RepoError::Integrity { message } => ApiError::new(
                StatusCode::CONFLICT,
                codes::INTEGRITY,
                "Integrity constraint violated",
                Some(message),
            ),
            RepoError::Timeout => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::DB_TIMEOUT,
                "Database timeout",
                None,
            ),
            RepoError::Persistence(msg) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::REPO,
                "Persistence error",
                Some(msg),
            ),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::QUERY,
            "Data could not be loaded",
            Some(err.to_string()),
        )
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { entity } => ApiError::new(
                StatusCode::NOT_FOUND,
                codes::NOT_FOUND,
                "Resource not found",
                Some(entity.to_string()),
            ),
            DomainError::Validation { message } => ApiError::validation(message),
            DomainError::Conflict { message } => ApiError::new(
                StatusCode::CONFLICT,
                codes::CONFLICT,
                "Request conflicts with current state",
                Some(message),
            ),
            transition @ DomainError::InvalidTransition { .. } => ApiError::new(
                StatusCode::CONFLICT,
                codes::INVALID_TRANSITION,
                "Status change not allowed",
                Some(transition.to_string()),
            ),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Missing | AuthError::Invalid => ApiError::unauthorized(),
            AuthError::Expired => ApiError::new(
                StatusCode::UNAUTHORIZED,
                codes::SESSION_EXPIRED,
                "Session expired",
                None,
            ),
            AuthError::Revoked => ApiError::new(
                StatusCode::UNAUTHORIZED,
                codes::SESSION_REVOKED,
                "Session revoked",
                None,
            ),
            forbidden @ AuthError::Forbidden { .. } => {
                ApiError::forbidden(Some(forbidden.to_string()))
            }
            AuthError::Repo(repo) => repo.into(),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Repo(repo) => repo.into(),
            SessionError::UnknownUser => ApiError::not_found("User not found"),
            SessionError::InvalidTtl => ApiError::validation(err.to_string()),
        }
    }
}

impl From<HymnServiceError> for ApiError {
    fn from(err: HymnServiceError) -> Self {
        match err {
            HymnServiceError::NotFound => ApiError::not_found("Hymn not found"),
            HymnServiceError::Repo(repo) => repo.into(),
            HymnServiceError::Query(query) => query.into(),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound("author") => ApiError::not_found("Author not found"),
            CatalogError::NotFound(_) => ApiError::not_found("Category not found"),
            CatalogError::Repo(repo) => repo.into(),
            CatalogError::Query(query) => query.into(),
        }
    }
}

impl From<FavoritesError> for ApiError {
    fn from(err: FavoritesError) -> Self {
        match err {
            FavoritesError::HymnNotFound => ApiError::not_found("Hymn not found"),
            FavoritesError::Repo(repo) => repo.into(),
            FavoritesError::Query(query) => query.into(),
        }
    }
}

impl From<ForumError> for ApiError {
    fn from(err: ForumError) -> Self {
        match err {
            ForumError::PostNotFound => ApiError::not_found("Post not found"),
            ForumError::CommentNotFound => ApiError::not_found("Comment not found"),
            ForumError::HymnNotFound => ApiError::not_found("Hymn not found"),
            ForumError::Forbidden => ApiError::forbidden(Some(err.to_string())),
            ForumError::Domain(domain) => domain.into(),
            ForumError::Repo(repo) => repo.into(),
            ForumError::Query(query) => query.into(),
        }
    }
}

impl From<NotificationsError> for ApiError {
    fn from(err: NotificationsError) -> Self {
        match err {
            NotificationsError::Domain(domain) => domain.into(),
            NotificationsError::Repo(repo) => repo.into(),
            NotificationsError::Query(query) => query.into(),
        }
    }
}

impl From<ProfileError> for ApiError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::NotFound => ApiError::not_found("User not found"),
            ProfileError::Domain(domain) => domain.into(),
            ProfileError::Repo(repo) => repo.into(),
            ProfileError::Query(query) => query.into(),
            ProfileError::Forum(forum) => forum.into(),
        }
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::NotFound => ApiError::not_found("Report not found"),
            ReportError::Forbidden => ApiError::forbidden(Some(err.to_string())),
            ReportError::Domain(domain) => domain.into(),
            ReportError::Repo(repo) => repo.into(),
            ReportError::Query(query) => query.into(),
        }
    }
}

impl From<AdminHymnError> for ApiError {
    fn from(err: AdminHymnError) -> Self {
        match err {
            AdminHymnError::NotFound => ApiError::not_found("Hymn not found"),
            AdminHymnError::MediaNotFound => ApiError::not_found("Media not found"),
            AdminHymnError::UnknownLink { .. } => ApiError::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_INPUT,
                "Unknown author or category",
                Some(err.to_string()),
            ),
            AdminHymnError::Domain(domain) => domain.into(),
            AdminHymnError::Repo(repo) => repo.into(),
            AdminHymnError::Hymns(hymns) => hymns.into(),
        }
    }
}

impl From<AdminCatalogError> for ApiError {
    fn from(err: AdminCatalogError) -> Self {
        match err {
            AdminCatalogError::NotFound("author") => ApiError::not_found("Author not found"),
            AdminCatalogError::NotFound(_) => ApiError::not_found("Category not found"),
            AdminCatalogError::InUse { .. } => ApiError::new(
                StatusCode::CONFLICT,
                codes::IN_USE,
                "Still linked to hymns",
                Some(err.to_string()),
            ),
            AdminCatalogError::Domain(domain) => domain.into(),
            AdminCatalogError::Repo(repo) => repo.into(),
        }
    }
}

impl From<AdminUserError> for ApiError {
    fn from(err: AdminUserError) -> Self {
        match err {
            AdminUserError::NotFound => ApiError::not_found("User not found"),
            AdminUserError::SelfModification => ApiError::new(
                StatusCode::CONFLICT,
                codes::CONFLICT,
                "Request conflicts with current state",
                Some(err.to_string()),
            ),
            AdminUserError::Repo(repo) => repo.into(),
            AdminUserError::Query(query) => query.into(),
        }
    }
}

impl From<AdminDashboardError> for ApiError {
    fn from(err: AdminDashboardError) -> Self {
        match err {
            AdminDashboardError::Repo(repo) => repo.into(),
            AdminDashboardError::Query(query) => query.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ReportStatus;

    #[test]
    fn validation_maps_to_400_with_hint() {
        let err = ApiError::from(DomainError::validation("title must not be empty"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), codes::VALIDATION);
        assert_eq!(err.hint.as_deref(), Some("title must not be empty"));
    }

    #[test]
    fn auth_failures_map_to_401_and_403() {
        assert_eq!(
            ApiError::from(AuthError::Expired).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::Forbidden {
                required: crate::domain::types::UserRole::Admin
            })
            .status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn session_store_failures_are_not_reported_as_bad_tokens() {
        let err = ApiError::from(AuthError::Repo(RepoError::from_persistence("connection reset")));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), codes::REPO);

        let timeout = ApiError::from(AuthError::Repo(RepoError::Timeout));
        assert_eq!(timeout.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn in_use_and_transitions_conflict() {
        let in_use = ApiError::from(AdminCatalogError::InUse {
            entity: "author",
            count: 3,
        });
        assert_eq!(in_use.status(), StatusCode::CONFLICT);
        assert_eq!(in_use.hint.as_deref(), Some("author is linked to 3 hymns"));

        let transition = ApiError::from(DomainError::InvalidTransition {
            from: ReportStatus::Resolved,
            to: ReportStatus::Pending,
        });
        assert_eq!(transition.code(), codes::INVALID_TRANSITION);
    }

    #[test]
    fn repository_failures_map_to_500() {
        let err = ApiError::from(HymnServiceError::Repo(RepoError::from_persistence("boom")));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let response = err.into_response();
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }
}
