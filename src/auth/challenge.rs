//! Authorization challenges
//!
//! A challenge is a fresh client id and nonce with an expiry. The nonce handed
//! to the client is a challenge token signed with the deployment key, so the
//! server can later recognise its own challenges without storing them. The
//! client binds the nonce into the message it signs (`issuer:nonce:timestamp`).

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use url::Url;

use super::error::AuthError;
use super::jwt::{decode_challenge, sign_challenge, ChallengeClaims, CHALLENGE_PURPOSE};
use super::keys::SigningKeys;

/// 128 bits for the client id
const CLIENT_ID_BYTES: usize = 16;
/// 256 bits for the nonce
const NONCE_BYTES: usize = 32;

/// Challenge issued by `/oauth/authorize`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Challenge {
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(rename = "challenge")]
    pub nonce: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Issues and recognises time-bounded challenges
#[derive(Debug, Clone)]
pub struct ChallengeIssuer {
    ttl: Duration,
    keys: Arc<SigningKeys>,
}

impl ChallengeIssuer {
    pub fn new(ttl: Duration, keys: Arc<SigningKeys>) -> Self {
        Self { ttl, keys }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a challenge for a client redirecting to `redirect_uri`
    pub fn issue(
        &self,
        redirect_uri: &str,
        scope: Option<&str>,
    ) -> Result<Challenge, AuthError> {
        self.issue_at(redirect_uri, scope, Utc::now())
    }

    pub fn issue_at(
        &self,
        redirect_uri: &str,
        scope: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Challenge, AuthError> {
        Url::parse(redirect_uri)
            .map_err(|e| AuthError::InvalidRequest(format!("redirect_uri: {}", e)))?;

        let client_id = generate_random_string(CLIENT_ID_BYTES)?;
        let nonce = generate_random_string(NONCE_BYTES)?;

        // Whole seconds, so the reported expiry is exactly what gets enforced
        let exp = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::SigningFailure("challenge ttl out of range".to_string()))?
            .timestamp();
        let expires_at = from_unix(exp)?;

        let claims = ChallengeClaims {
            jti: nonce,
            sub: client_id.clone(),
            iat: now.timestamp(),
            exp,
            purpose: CHALLENGE_PURPOSE.to_string(),
        };
        let token = sign_challenge(&self.keys, &claims)?;

        Ok(Challenge {
            client_id,
            redirect_uri: redirect_uri.to_string(),
            nonce: token,
            expires_at,
            scope: scope.filter(|s| !s.is_empty()).map(str::to_string),
        })
    }

    /// Confirm `nonce` is an unexpired challenge issued with this key
    pub fn verify(&self, nonce: &str) -> Result<ChallengeClaims, AuthError> {
        self.verify_at(nonce, Utc::now())
    }

    pub fn verify_at(&self, nonce: &str, now: DateTime<Utc>) -> Result<ChallengeClaims, AuthError> {
        let claims = decode_challenge(nonce, self.keys.verification_key()).map_err(|e| {
            tracing::debug!(error = %e, "Challenge rejected");
            AuthError::UnknownChallenge
        })?;

        if now > from_unix(claims.exp)? {
            return Err(AuthError::ChallengeExpired);
        }

        Ok(claims)
    }
}

fn from_unix(seconds: i64) -> Result<DateTime<Utc>, AuthError> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or(AuthError::UnknownChallenge)
}

/// Generate a URL-safe random string from `n_bytes` of OS randomness
pub fn generate_random_string(n_bytes: usize) -> Result<String, AuthError> {
    let mut bytes = vec![0u8; n_bytes];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AuthError::RandomnessFailure(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
