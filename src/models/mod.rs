//! Request and response bodies of the OAuth endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub use crate::auth::{Challenge, Jwks};

/// Query of `GET /oauth/authorize`
#[derive(Debug, Deserialize, Validate)]
pub struct AuthorizeQuery {
    #[validate(url)]
    pub redirect_uri: String,
    pub scope: Option<String>,
}

/// Signed assertion presented by a wallet
///
/// `signature` and `publicKey` are base64; `nonce` is the challenge the
/// message is bound to, when the client uses the bound form.
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyRequest {
    #[validate(length(min = 1, message = "message must not be empty"))]
    pub message: String,
    #[validate(length(min = 1, message = "signature must not be empty"))]
    pub signature: String,
    #[serde(rename = "publicKey")]
    #[validate(length(min = 1, message = "publicKey must not be empty"))]
    pub public_key: String,
    #[serde(default)]
    pub nonce: Option<String>,
}

/// Body of `POST /oauth/token`; same shape as a verify request
pub type TokenRequest = VerifyRequest;

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    /// User-friendly address of the signing wallet
    pub wallet: String,
    pub issuer: String,
    pub nonce: Option<String>,
    /// When the assertion stops being accepted
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub jwt: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyTokenRequest {
    #[validate(length(min = 1, message = "jwt must not be empty"))]
    pub jwt: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyTokenResponse {
    pub valid: bool,
    pub issuer: String,
    /// Expiry as unix seconds
    pub exp: i64,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
