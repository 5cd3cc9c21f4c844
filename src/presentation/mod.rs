//! View models shared by every page-level response.
//!
//! Nothing here touches the database; handlers build these from service
//! results and serialize them next to the data they describe.

pub mod alert;
pub mod badge;
pub mod breadcrumbs;
pub mod chrome;
pub mod paginator;
pub mod search;
pub mod tabs;

pub use alert::{AlertBanner, AlertKind};
pub use badge::{Badge, BadgeTone};
pub use breadcrumbs::{Breadcrumb, Breadcrumbs};
pub use chrome::{PageChrome, PageEnvelope, PageMeta, SiteIdentity};
pub use paginator::{PageItem, Paginator};
pub use search::{DEFAULT_DEBOUNCE, DebouncedSearch};
pub use tabs::{Tab, TabStrip};
