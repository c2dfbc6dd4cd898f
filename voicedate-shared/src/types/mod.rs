pub mod api;
pub mod auth;
pub mod event;

pub use api::*;
pub use auth::*;
