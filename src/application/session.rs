//! Bearer sessions and the per-request session context.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{CreateSessionParams, RepoError, SessionsRepo, UsersRepo};
use crate::domain::entities::{SessionRecord, UserRecord};
use crate::domain::types::UserRole;

const TOKEN_TAG: &str = "hs";
const PREFIX_LEN: usize = 12;
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("user not found")]
    UnknownUser,
    #[error("session lifetime must be positive")]
    InvalidTtl,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing session token")]
    Missing,
    #[error("invalid session token")]
    Invalid,
    #[error("session expired")]
    Expired,
    #[error("session revoked")]
    Revoked,
    #[error("insufficient role: `{required}` required")]
    Forbidden { required: UserRole },
    /// The session store could not be read; the token may well be valid.
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// The signed-in user of one request, inserted by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
}

impl SessionContext {
    pub fn from_user(session_id: Uuid, user: &UserRecord) -> Self {
        Self {
            session_id,
            user_id: user.id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            role: user.role,
        }
    }

    pub fn is_moderator(&self) -> bool {
        self.role >= UserRole::Moderator
    }

    pub fn require_moderator(&self) -> Result<(), AuthError> {
        self.require(UserRole::Moderator)
    }

    pub fn require_admin(&self) -> Result<(), AuthError> {
        self.require(UserRole::Admin)
    }

    /// Owners may change their own content; moderators may change anyone's.
    pub fn can_modify(&self, owner_id: Uuid) -> bool {
        self.user_id == owner_id || self.is_moderator()
    }

    fn require(&self, required: UserRole) -> Result<(), AuthError> {
        if self.role >= required {
            Ok(())
        } else {
            Err(AuthError::Forbidden { required })
        }
    }
}

/// Cache key value for reads that differ per viewer.
pub fn viewer_key(session: Option<&SessionContext>) -> String {
    session.map_or_else(|| "anonymous".to_string(), |s| s.user_id.to_string())
}

#[derive(Debug, Clone)]
pub struct SessionIssued {
    pub record: SessionRecord,
    pub token: String,
}

#[derive(Clone)]
pub struct SessionService {
    sessions: Arc<dyn SessionsRepo>,
    users: Arc<dyn UsersRepo>,
}

impl SessionService {
    pub fn new(sessions: Arc<dyn SessionsRepo>, users: Arc<dyn UsersRepo>) -> Self {
        Self { sessions, users }
    }

    pub async fn issue(&self, user_id: Uuid, ttl: Duration) -> Result<SessionIssued, SessionError> {
        if !ttl.is_positive() {
            return Err(SessionError::InvalidTtl);
        }
        self.users
            .find_user(user_id)
            .await?
            .ok_or(SessionError::UnknownUser)?;

        let prefix = generate_prefix();
        let secret = generate_secret();
        let token = format!("{TOKEN_TAG}_{prefix}_{secret}");

        let record = self
            .sessions
            .create_session(CreateSessionParams {
                user_id,
                prefix,
                hashed_secret: hash_secret(&secret),
                expires_at: OffsetDateTime::now_utc() + ttl,
            })
            .await?;

        info!(
            target: "hymnary::session",
            session_id = %record.id,
            user_id = %user_id,
            expires_at = %record.expires_at,
            "Session issued"
        );

        Ok(SessionIssued { record, token })
    }

    pub async fn authenticate(&self, token: &str) -> Result<SessionContext, AuthError> {
        let (record, user) = self.resolve(token).await?;
        Ok(SessionContext::from_user(record.id, &user))
    }

    pub async fn revoke(&self, id: Uuid) -> Result<(), SessionError> {
        self.sessions
            .revoke_session(id, OffsetDateTime::now_utc())
            .await?;
        Ok(())
    }

    /// Signs the holder of `token` out.
    pub async fn end(&self, token: &str) -> Result<(), AuthError> {
        let (record, _) = self.resolve(token).await?;
        self.sessions
            .revoke_session(record.id, OffsetDateTime::now_utc())
            .await?;
        info!(target: "hymnary::session", session_id = %record.id, "Session ended");
        Ok(())
    }

    async fn resolve(&self, token: &str) -> Result<(SessionRecord, UserRecord), AuthError> {
        let parsed = parse_token(token).ok_or(AuthError::Invalid)?;
        let record = self
            .sessions
            .find_session_by_prefix(&parsed.prefix)
            .await?
            .ok_or(AuthError::Invalid)?;

        let hashed_input = hash_secret(&parsed.secret);
        if record.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(AuthError::Invalid);
        }

        let now = OffsetDateTime::now_utc();
        if record.revoked_at.is_some_and(|revoked_at| revoked_at <= now) {
            return Err(AuthError::Revoked);
        }
        if record.expires_at <= now {
            return Err(AuthError::Expired);
        }

        let user = self
            .users
            .find_user(record.user_id)
            .await?
            .ok_or(AuthError::Invalid)?;

        Ok((record, user))
    }
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn generate_prefix() -> String {
    Uuid::new_v4().simple().to_string()[..PREFIX_LEN].to_string()
}

fn generate_secret() -> String {
    let mut raw = [0_u8; 32];
    raw[..16].copy_from_slice(Uuid::new_v4().as_bytes());
    raw[16..].copy_from_slice(Uuid::new_v4().as_bytes());
    URL_SAFE_NO_PAD.encode(raw)
}

struct ParsedToken {
    prefix: String,
    secret: String,
}

fn parse_token(token: &str) -> Option<ParsedToken> {
    let mut parts = token.trim().splitn(3, '_');
    if parts.next()? != TOKEN_TAG {
        return None;
    }
    let prefix = parts.next()?;
    let secret = parts.next()?;
    if prefix.len() != PREFIX_LEN || secret.len() < MIN_SECRET_LEN {
        return None;
    }
    Some(ParsedToken {
        prefix: prefix.to_string(),
        secret: secret.to_string(),
    })
}
