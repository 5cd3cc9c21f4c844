//! Wire types shared by the Hymnary service and its clients.
//!
//! Enumerations double as Postgres enum mappings when the `sqlx` feature is on.

mod enums;
mod requests;
mod responses;

pub use enums::*;
pub use requests::*;
pub use responses::*;
