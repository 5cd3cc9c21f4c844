//! Application services for the administrative surface.

pub mod catalog;
pub mod dashboard;
pub mod hymns;
pub mod users;

pub use catalog::{AdminCatalogError, AdminCatalogService, AuthorCommand, CategoryCommand};
pub use dashboard::{AdminDashboardError, AdminDashboardService};
pub use hymns::{AdminHymnError, AdminHymnService, HymnWriteCommand};
pub use users::{AdminUserError, AdminUserService};
