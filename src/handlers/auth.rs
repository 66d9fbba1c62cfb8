//! OAuth HTTP handlers
//!
//! Endpoints for the wallet challenge-response flow and token publication.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use validator::Validate;

use crate::auth::{decode_public_key, decode_signature, AuthError, Challenge, Jwks};
use crate::error::ApiResult;
use crate::models::{
    AuthorizeQuery, TokenRequest, TokenResponse, VerifyRequest, VerifyResponse,
    VerifyTokenRequest, VerifyTokenResponse,
};
use crate::state::AppState;

/// Decoded byte fields of an assertion body
struct AssertionBytes {
    signature: Vec<u8>,
    public_key: Vec<u8>,
}

fn decode_assertion(req: &VerifyRequest) -> Result<AssertionBytes, AuthError> {
    let signature = decode_signature(&req.signature)
        .map_err(|e| AuthError::InvalidRequest(format!("signature: {}", e)))?;
    let public_key = decode_public_key(&req.public_key)
        .map_err(|e| AuthError::InvalidRequest(format!("publicKey: {}", e)))?;
    Ok(AssertionBytes {
        signature,
        public_key,
    })
}

/// GET /oauth/authorize - Issue a challenge for an anonymous client
pub async fn authorize(
    State(state): State<AppState>,
    query: Result<Query<AuthorizeQuery>, QueryRejection>,
) -> ApiResult<Json<Challenge>> {
    let Query(query) = query?;
    query.validate()?;

    let challenge = state
        .auth_service
        .authorize(&query.redirect_uri, query.scope.as_deref())?;

    Ok(Json(challenge))
}

/// POST /oauth/verify - Verify a signed assertion and the wallet behind it
pub async fn verify(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> ApiResult<Json<VerifyResponse>> {
    let Json(req) = payload?;
    req.validate()?;
    let bytes = decode_assertion(&req)?;

    let verification = state
        .auth_service
        .verify_wallet(
            &req.message,
            &bytes.signature,
            &bytes.public_key,
            req.nonce.as_deref(),
        )
        .await?;

    Ok(Json(VerifyResponse {
        valid: true,
        wallet: verification.wallet.to_string(),
        issuer: verification.assertion.issuer,
        nonce: verification.assertion.nonce,
        expires_at: verification.assertion.expires_at,
    }))
}

/// POST /oauth/token - Exchange a verified assertion for an access token
pub async fn token(
    State(state): State<AppState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> ApiResult<Json<TokenResponse>> {
    let Json(req) = payload?;
    req.validate()?;
    let bytes = decode_assertion(&req)?;

    let issued = state
        .auth_service
        .exchange_assertion(
            &req.message,
            &bytes.signature,
            &bytes.public_key,
            req.nonce.as_deref(),
        )
        .await?;

    Ok(Json(TokenResponse { jwt: issued.token }))
}

/// GET /oauth/jwks - Public keys for offline token verification
pub async fn jwks(State(state): State<AppState>) -> Json<Jwks> {
    Json(state.auth_service.jwks())
}

/// POST /oauth/verify-token - Validate a previously issued access token
pub async fn verify_token(
    State(state): State<AppState>,
    payload: Result<Json<VerifyTokenRequest>, JsonRejection>,
) -> ApiResult<Json<VerifyTokenResponse>> {
    let Json(req) = payload?;
    req.validate()?;

    let verified = state.auth_service.verify_token(&req.jwt)?;

    Ok(Json(VerifyTokenResponse {
        valid: true,
        issuer: verified.issuer,
        exp: verified.expires_at.timestamp(),
    }))
}
