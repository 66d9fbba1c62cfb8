//! API handlers for the TON OAuth server

pub mod auth;
pub mod health;

pub use auth::*;
pub use health::{health_check, not_found, root};
