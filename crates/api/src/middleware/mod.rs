//! Request extractors shared by the routes.

pub mod acting_user;
pub mod extract;

pub use acting_user::ActingUser;
pub use extract::{ApiJson, ApiPath, ApiQuery, ValidatedJson};
