//! Liveness endpoints of the server itself

use axum::Json;

use crate::error::ApiError;
use crate::models::HealthResponse;

pub async fn root() -> &'static str {
    "TON OAuth Server"
}

/// Health check endpoint
///
/// Reports only on this process. The ledger oracle is not probed here; an
/// unreachable oracle shows up as 503 on the verify and token endpoints.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Fallback for unknown routes
pub async fn not_found() -> ApiError {
    ApiError::NotFound("no such endpoint".to_string())
}
