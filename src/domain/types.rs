//! Shared domain enumerations aligned with persisted database enums.
//!
//! The wire crate owns the definitions so clients and the service agree on
//! spelling; the `sqlx` feature maps them onto the Postgres enum types.

pub use hymnary_api_types::{
    ForumSort, HymnSort, HymnStatus, NotificationKind, NotificationTab, ReportStatus,
    ReportTarget, SearchKind, SortDirection, ThemePreference, UnknownVariant, UserRole,
};
