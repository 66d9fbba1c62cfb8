//! Route definitions for the TON OAuth server

mod auth;

pub use auth::oauth_routes;
