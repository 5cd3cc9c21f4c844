use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} `{}`", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.trim() {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// Moderation state of a catalog entry (mirrors Postgres enum `hymn_status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "hymn_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum HymnStatus {
    Pending,
    Approved,
    Rejected,
}

string_enum!(HymnStatus, "hymn status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "user_role", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Moderator,
    Admin,
}

string_enum!(UserRole, "user role", {
    User => "user",
    Moderator => "moderator",
    Admin => "admin",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "theme_preference", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ThemePreference {
    Light,
    Dark,
    #[default]
    System,
}

string_enum!(ThemePreference, "theme preference", {
    Light => "light",
    Dark => "dark",
    System => "system",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "notification_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CommentReply,
    PostLike,
    CommentLike,
    PostMention,
    CommentMention,
    PostFeatured,
    System,
}

string_enum!(NotificationKind, "notification kind", {
    CommentReply => "comment_reply",
    PostLike => "post_like",
    CommentLike => "comment_like",
    PostMention => "post_mention",
    CommentMention => "comment_mention",
    PostFeatured => "post_featured",
    System => "system",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "report_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Reviewing,
    Resolved,
    Dismissed,
}

string_enum!(ReportStatus, "report status", {
    Pending => "pending",
    Reviewing => "reviewing",
    Resolved => "resolved",
    Dismissed => "dismissed",
});

impl ReportStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ReportStatus::Resolved | ReportStatus::Dismissed)
    }

    /// Whether a report in this state may move to `next`.
    pub fn can_transition_to(self, next: ReportStatus) -> bool {
        match (self, next) {
            (ReportStatus::Pending, ReportStatus::Pending) => false,
            (ReportStatus::Pending, _) => true,
            (ReportStatus::Reviewing, ReportStatus::Resolved | ReportStatus::Dismissed) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "report_target", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ReportTarget {
    User,
    Hymn,
    Comment,
    ForumPost,
}

string_enum!(ReportTarget, "report target", {
    User => "user",
    Hymn => "hymn",
    Comment => "comment",
    ForumPost => "forum_post",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HymnSort {
    #[default]
    Title,
    Number,
    Views,
    Recent,
}

string_enum!(HymnSort, "hymn sort", {
    Title => "title",
    Number => "number",
    Views => "views",
    Recent => "recent",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

string_enum!(SortDirection, "sort direction", {
    Asc => "asc",
    Desc => "desc",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForumSort {
    #[default]
    Latest,
    Popular,
    Comments,
}

string_enum!(ForumSort, "forum sort", {
    Latest => "latest",
    Popular => "popular",
    Comments => "comments",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTab {
    #[default]
    All,
    Unread,
}

string_enum!(NotificationTab, "notification tab", {
    All => "all",
    Unread => "unread",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchKind {
    #[default]
    All,
    Hymns,
    Authors,
    Categories,
}

string_enum!(SearchKind, "search kind", {
    All => "all",
    Hymns => "hymns",
    Authors => "authors",
    Categories => "categories",
});
