//! TON OAuth Server Library
//!
//! Wallet challenge-response authentication for TON: a client signs a
//! timestamped assertion with its wallet key, the server checks the signature
//! and that the wallet is live on the ledger, then issues an RS256 access
//! token verifiable offline through the published JWKS.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};

use auth::{AuthService, AuthSettings, InMemoryReplayGuard, SigningKeys};
use config::Config;
use ledger::WalletOracle;
use state::AppState;

/// Wire the auth service from configuration, loaded keys and an oracle
pub fn build_state(config: &Config, keys: SigningKeys, oracle: Arc<dyn WalletOracle>) -> AppState {
    let mut service = AuthService::new(AuthSettings::from(config), keys, oracle);

    if config.replay_protection {
        tracing::info!(
            capacity = config.replay_cache_capacity,
            "Replay protection enabled for token exchange"
        );
        service = service.with_replay_guard(Arc::new(InMemoryReplayGuard::new(
            config.replay_cache_capacity,
        )));
    }

    AppState::new(Arc::new(service))
}

/// Create the app router with all middleware applied
pub fn build_router(app_state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .merge(routes::oauth_routes())
        .fallback(handlers::not_found)
        .with_state(app_state)
        .layer(axum::middleware::from_fn(middleware::security_headers));

    let router = if config.environment.is_production() {
        router.layer(axum::middleware::from_fn(middleware::hsts_header))
    } else {
        router
    };

    router
        .layer(axum::middleware::from_fn(middleware::request_tracing))
        .layer(configure_cors(config.cors_allowed_origins.as_deref()))
}

fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let Some(allowed_origins) = allowed_origins else {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    };

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}
