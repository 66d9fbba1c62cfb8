//! JWT access token issuance and validation
//!
//! Tokens are RS256-signed with the deployment key and carry a fixed claim set
//! (`jti`, `iss`, `iat`, `exp`). Nothing is stored after issuance: a token is
//! valid iff its signature verifies and it has not expired.
//!
//! Authorization challenges are signed with the same key, under a separate
//! claim set that can never be mistaken for an access token.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::keys::{SigningKeys, VerificationKey};

/// The only algorithm tokens are signed and accepted with
pub const TOKEN_ALGORITHM: Algorithm = Algorithm::RS256;

/// JWT-related errors
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Token decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Unexpected signing algorithm: {0}")]
    AlgorithmMismatch(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Invalid claims: {0}")]
    InvalidClaims(String),
}

/// JWT claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    /// JWT ID
    pub jti: String,
    /// Issuer
    pub iss: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// The part of a verified token callers get to see
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub issuer: String,
    pub expires_at: DateTime<Utc>,
}

/// Generate an access token signed with the deployment key
///
/// # Arguments
/// * `keys` - The active signing key pair
/// * `issuer` - Value of the `iss` claim
/// * `ttl` - Token lifetime, must be positive
pub fn generate_access_token(
    keys: &SigningKeys,
    issuer: &str,
    ttl: Duration,
) -> Result<(String, AccessClaims), JwtError> {
    generate_access_token_at(keys, issuer, ttl, Utc::now())
}

/// Same as [`generate_access_token`] with an explicit issuance instant
pub fn generate_access_token_at(
    keys: &SigningKeys,
    issuer: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<(String, AccessClaims), JwtError> {
    if ttl <= Duration::zero() {
        return Err(JwtError::EncodingFailed(
            "token ttl must be positive".to_string(),
        ));
    }

    let expires_at = now
        .checked_add_signed(ttl)
        .ok_or_else(|| JwtError::EncodingFailed("token ttl out of range".to_string()))?;

    let claims = AccessClaims {
        jti: Uuid::new_v4().to_string(),
        iss: issuer.to_string(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };

    let mut header = Header::new(TOKEN_ALGORITHM);
    header.kid = Some(keys.key_id().to_string());

    let token = encode(&header, &claims, keys.encoding_key())
        .map_err(|e| JwtError::EncodingFailed(e.to_string()))?;

    Ok((token, claims))
}

/// Verify and decode an access token
///
/// The header algorithm is checked against [`TOKEN_ALGORITHM`] before any
/// signature work, so a token can never pick its own verification method.
pub fn verify_access_token(token: &str, key: &VerificationKey) -> Result<VerifiedToken, JwtError> {
    check_algorithm(token)?;

    let mut validation = Validation::new(TOKEN_ALGORITHM);
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["exp", "iss"]);

    let token_data = decode::<AccessClaims>(token, key.decoding_key(), &validation).map_err(
        |e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            ErrorKind::InvalidSignature => JwtError::InvalidSignature,
            ErrorKind::InvalidAlgorithm => JwtError::AlgorithmMismatch("header".to_string()),
            ErrorKind::MissingRequiredClaim(claim) => {
                JwtError::InvalidClaims(format!("missing claim: {}", claim))
            }
            ErrorKind::Json(_) => JwtError::InvalidClaims(e.to_string()),
            _ => JwtError::DecodingFailed(e.to_string()),
        },
    )?;

    let claims = token_data.claims;
    if claims.exp < claims.iat {
        return Err(JwtError::InvalidClaims(
            "exp precedes iat".to_string(),
        ));
    }

    let expires_at = Utc
        .timestamp_opt(claims.exp, 0)
        .single()
        .ok_or_else(|| JwtError::InvalidClaims("exp out of range".to_string()))?;

    Ok(VerifiedToken {
        issuer: claims.iss,
        expires_at,
    })
}

/// Reject any token whose header names an algorithm other than [`TOKEN_ALGORITHM`]
///
/// Algorithms `jsonwebtoken` does not know (`none` among them) make header
/// decoding fail; the raw header is inspected so they are still reported as
/// an algorithm mismatch.
fn check_algorithm(token: &str) -> Result<(), JwtError> {
    match decode_header(token) {
        Ok(header) if header.alg == TOKEN_ALGORITHM => Ok(()),
        Ok(header) => Err(JwtError::AlgorithmMismatch(format!("{:?}", header.alg))),
        Err(e) => match raw_header_algorithm(token) {
            Some(alg) if alg != "RS256" => Err(JwtError::AlgorithmMismatch(alg)),
            _ => Err(JwtError::DecodingFailed(e.to_string())),
        },
    }
}

fn raw_header_algorithm(token: &str) -> Option<String> {
    let segment = token.split('.').next()?;
    let bytes = URL_SAFE_NO_PAD.decode(segment.trim_end_matches('=')).ok()?;
    let header: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    header.get("alg")?.as_str().map(str::to_string)
}

/// Value of the `purpose` claim of challenge tokens
pub const CHALLENGE_PURPOSE: &str = "challenge";

/// Claims of a signed authorization challenge
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChallengeClaims {
    /// Random nonce
    pub jti: String,
    /// Anonymous client id the challenge was issued to
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub purpose: String,
}

/// Sign challenge claims with the deployment key
pub fn sign_challenge(keys: &SigningKeys, claims: &ChallengeClaims) -> Result<String, JwtError> {
    let mut header = Header::new(TOKEN_ALGORITHM);
    header.kid = Some(keys.key_id().to_string());

    encode(&header, claims, keys.encoding_key()).map_err(|e| JwtError::EncodingFailed(e.to_string()))
}

/// Check a challenge token's signature and shape
///
/// Expiry is left to the caller, which compares `exp` against its own clock.
pub fn decode_challenge(token: &str, key: &VerificationKey) -> Result<ChallengeClaims, JwtError> {
    check_algorithm(token)?;

    let mut validation = Validation::new(TOKEN_ALGORITHM);
    validation.validate_exp = false;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let token_data = decode::<ChallengeClaims>(token, key.decoding_key(), &validation).map_err(
        |e| match e.kind() {
            ErrorKind::InvalidSignature => JwtError::InvalidSignature,
            ErrorKind::InvalidAlgorithm => JwtError::AlgorithmMismatch("header".to_string()),
            ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => {
                JwtError::InvalidClaims(e.to_string())
            }
            _ => JwtError::DecodingFailed(e.to_string()),
        },
    )?;

    if token_data.claims.purpose != CHALLENGE_PURPOSE {
        return Err(JwtError::InvalidClaims("not a challenge".to_string()));
    }

    Ok(token_data.claims)
}
