pub mod admin;
pub mod auth;
pub mod notifications;

pub use admin::*;
pub use auth::*;
pub use notifications::*;
