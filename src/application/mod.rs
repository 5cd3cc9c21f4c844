//! Application services layer.

pub mod admin;
pub mod catalog;
pub mod error;
pub mod favorites;
pub mod forum;
pub mod hymns;
pub mod notifications;
pub mod pagination;
pub mod profile;
pub mod reports;
pub mod repos;
pub mod session;
