//! OAuth routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::auth;
use crate::state::AppState;

/// Create OAuth routes
pub fn oauth_routes() -> Router<AppState> {
    Router::new()
        .route("/oauth/authorize", get(auth::authorize))
        .route("/oauth/verify", post(auth::verify))
        .route("/oauth/token", post(auth::token))
        .route("/oauth/jwks", get(auth::jwks))
        .route("/.well-known/jwks.json", get(auth::jwks))
        .route("/oauth/verify-token", post(auth::verify_token))
}
