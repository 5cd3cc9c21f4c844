//! Domain layer types and invariants.

pub mod entities;
pub mod error;
pub mod forum;
pub mod hymns;
pub mod types;
pub mod users;
