//! Hymnary: a Catholic hymns library with a community forum.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod media;
pub mod presentation;
