use serde::Serialize;

use crate::domain::types::{HymnStatus, NotificationKind, ReportStatus, UserRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeTone {
    Neutral,
    Info,
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub label: &'static str,
    pub tone: BadgeTone,
}

impl Badge {
    const fn new(label: &'static str, tone: BadgeTone) -> Self {
        Self { label, tone }
    }
}

impl From<HymnStatus> for Badge {
    fn from(status: HymnStatus) -> Self {
        match status {
            HymnStatus::Pending => Badge::new("Pending", BadgeTone::Warning),
            HymnStatus::Approved => Badge::new("Approved", BadgeTone::Success),
            HymnStatus::Rejected => Badge::new("Rejected", BadgeTone::Danger),
        }
    }
}

impl From<ReportStatus> for Badge {
    fn from(status: ReportStatus) -> Self {
        match status {
            ReportStatus::Pending => Badge::new("Pending", BadgeTone::Warning),
            ReportStatus::Reviewing => Badge::new("Reviewing", BadgeTone::Info),
            ReportStatus::Resolved => Badge::new("Resolved", BadgeTone::Success),
            ReportStatus::Dismissed => Badge::new("Dismissed", BadgeTone::Neutral),
        }
    }
}

impl From<UserRole> for Badge {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::User => Badge::new("Member", BadgeTone::Neutral),
            UserRole::Moderator => Badge::new("Moderator", BadgeTone::Info),
            UserRole::Admin => Badge::new("Administrator", BadgeTone::Danger),
        }
    }
}

impl From<NotificationKind> for Badge {
    fn from(kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::CommentReply => Badge::new("Reply", BadgeTone::Info),
            NotificationKind::PostLike | NotificationKind::CommentLike => {
                Badge::new("Like", BadgeTone::Success)
            }
            NotificationKind::PostMention | NotificationKind::CommentMention => {
                Badge::new("Mention", BadgeTone::Info)
            }
            NotificationKind::PostFeatured => Badge::new("Featured", BadgeTone::Success),
            NotificationKind::System => Badge::new("Announcement", BadgeTone::Warning),
        }
    }
}
