//! Query-string shapes accepted by the JSON handlers.

use serde::Deserialize;
use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::domain::types::{
    ForumSort, HymnSort, HymnStatus, NotificationKind, NotificationTab, ReportStatus,
    ReportTarget, SearchKind, SortDirection, UnknownVariant, UserRole,
};

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageQuery {
    pub fn request(&self) -> PageRequest {
        PageRequest::from_query(self.page, self.page_size)
    }
}

/// Every listing query carries its own `page`/`page_size` pair; flattening
/// a shared struct would lose the numeric types under `serde_urlencoded`.
macro_rules! paged {
    ($($query:ty),+ $(,)?) => {
        $(impl $query {
            pub fn page_request(&self) -> PageRequest {
                PageRequest::from_query(self.page, self.page_size)
            }
        })+
    };
}

paged!(
    HymnListQuery,
    SearchQuery,
    AuthorListQuery,
    ForumListQuery,
    NotificationListQuery,
    AdminHymnListQuery,
    AdminUserListQuery,
    AdminReportListQuery,
);

#[derive(Debug, Default, Deserialize)]
pub struct HymnListQuery {
    pub search: Option<String>,
    pub author_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub sort: HymnSort,
    pub direction: Option<SortDirection>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub kind: SearchKind,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthorListQuery {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForumListQuery {
    pub search: Option<String>,
    pub tag: Option<String>,
    pub hymn_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub sort: ForumSort,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationListQuery {
    #[serde(default)]
    pub tab: NotificationTab,
    /// Comma-separated notification kinds.
    pub kinds: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl NotificationListQuery {
    pub fn kinds(&self) -> Result<Vec<NotificationKind>, UnknownVariant> {
        self.kinds
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|kind| !kind.is_empty())
            .map(str::parse)
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminHymnListQuery {
    pub status: Option<HymnStatus>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminUserListQuery {
    pub search: Option<String>,
    pub role: Option<UserRole>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminReportListQuery {
    pub status: Option<ReportStatus>,
    pub target_kind: Option<ReportTarget>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_kinds_parse_from_comma_list() {
        let query = NotificationListQuery {
            kinds: Some("comment_reply, post_like,".to_string()),
            ..NotificationListQuery::default()
        };
        assert_eq!(
            query.kinds().expect("known kinds"),
            vec![NotificationKind::CommentReply, NotificationKind::PostLike]
        );

        let unknown = NotificationListQuery {
            kinds: Some("gossip".to_string()),
            ..NotificationListQuery::default()
        };
        assert!(unknown.kinds().is_err());
    }
}
