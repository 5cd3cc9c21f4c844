use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::{HymnStatus, ReportStatus, ReportTarget, ThemePreference, UserRole};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForumPostCreateRequest {
    pub title: String,
    pub content: String,
    pub hymn_id: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForumPostUpdateRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommentCreateRequest {
    pub content: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProfileUpdateRequest {
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SettingsUpdateRequest {
    pub theme: ThemePreference,
}

/// Marks the listed notifications as read; an absent list marks all of them.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MarkReadRequest {
    pub ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportSubmitRequest {
    pub target_kind: ReportTarget,
    pub target_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HymnWriteRequest {
    pub number: Option<i32>,
    pub title: String,
    pub lyrics: String,
    pub status: Option<HymnStatus>,
    #[serde(default)]
    pub author_ids: Vec<Uuid>,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HymnStatusRequest {
    pub status: HymnStatus,
}

/// Replaces every author and category link of a hymn.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HymnLinksRequest {
    #[serde(default)]
    pub author_ids: Vec<Uuid>,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
}

/// A media attachment for a hymn, tagged by `kind`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaAttachRequest {
    Pdf {
        url: String,
        description: Option<String>,
    },
    Audio {
        url: String,
        title: Option<String>,
        pdf_id: Option<Uuid>,
    },
    Video {
        url: String,
        source: Option<String>,
        pdf_id: Option<Uuid>,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthorWriteRequest {
    pub name: String,
    pub biography: Option<String>,
    pub birth_year: Option<i32>,
    pub death_year: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CategoryWriteRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserRoleRequest {
    pub role: UserRole,
}

/// Recipients of an administrative broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastAudience {
    All,
    Role(UserRole),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BroadcastRequest {
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    /// Restricts the broadcast to one role; everyone when absent.
    pub role: Option<UserRole>,
}

impl BroadcastRequest {
    pub fn audience(&self) -> BroadcastAudience {
        match self.role {
            Some(role) => BroadcastAudience::Role(role),
            None => BroadcastAudience::All,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportStatusRequest {
    pub status: ReportStatus,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeaturePostRequest {
    pub featured: bool,
}
