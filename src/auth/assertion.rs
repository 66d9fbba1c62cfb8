//! Signed assertion verification
//!
//! A wallet proves key ownership by signing `issuer:timestamp` (or
//! `issuer:nonce:timestamp` when bound to a challenge). Freshness is measured
//! against the signed timestamp, so no server state is needed; a captured
//! assertion stays replayable until its TTL runs out unless the replay guard
//! is enabled.

use chrono::{DateTime, Duration, Utc};

use super::challenge::ChallengeIssuer;
use super::crypto::verify_wallet_signature;
use super::error::AuthError;

/// Fully validated assertion, ready for the wallet liveness gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAssertion {
    pub issuer: String,
    pub timestamp: DateTime<Utc>,
    /// `timestamp + ttl`: the instant this assertion stops being accepted
    pub expires_at: DateTime<Utc>,
    pub nonce: Option<String>,
    pub public_key: Vec<u8>,
}

/// Verifies wallet-signed assertions against the configured issuer and TTL
#[derive(Debug, Clone)]
pub struct AssertionVerifier {
    issuer: String,
    ttl: Duration,
    challenges: ChallengeIssuer,
    require_challenge_binding: bool,
}

impl AssertionVerifier {
    /// `challenges` recognises the nonces embedded in bound messages
    pub fn new(issuer: impl Into<String>, ttl: Duration, challenges: ChallengeIssuer) -> Self {
        Self {
            issuer: issuer.into(),
            ttl,
            challenges,
            require_challenge_binding: false,
        }
    }

    /// Reject assertions that do not embed a challenge nonce
    pub fn with_challenge_binding(mut self, required: bool) -> Self {
        self.require_challenge_binding = required;
        self
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn verify(
        &self,
        message: &str,
        signature: &[u8],
        public_key: &[u8],
        nonce: Option<&str>,
    ) -> Result<VerifiedAssertion, AuthError> {
        self.verify_at(message, signature, public_key, nonce, Utc::now())
    }

    /// Verify against an explicit server clock reading
    pub fn verify_at(
        &self,
        message: &str,
        signature: &[u8],
        public_key: &[u8],
        nonce: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<VerifiedAssertion, AuthError> {
        if self.require_challenge_binding && nonce.is_none() {
            return Err(AuthError::InvalidRequest(
                "challenge nonce is required".to_string(),
            ));
        }

        verify_wallet_signature(public_key, message.as_bytes(), signature)?;

        let parsed = parse_message(message, nonce.is_some())?;

        if parsed.issuer != self.issuer {
            tracing::debug!(got = %parsed.issuer, expected = %self.issuer, "Issuer mismatch");
            return Err(AuthError::IssuerMismatch);
        }

        if let (Some(expected), Some(embedded)) = (nonce, parsed.nonce) {
            if expected != embedded {
                return Err(AuthError::ChallengeMismatch);
            }
            self.challenges.verify_at(embedded, now)?;
        }

        let timestamp = DateTime::parse_from_rfc3339(parsed.timestamp)
            .map_err(|_| AuthError::MalformedTimestamp)?
            .with_timezone(&Utc);

        if timestamp > now {
            return Err(AuthError::FutureTimestamp);
        }
        if now - timestamp > self.ttl {
            return Err(AuthError::Expired);
        }

        Ok(VerifiedAssertion {
            issuer: parsed.issuer.to_string(),
            timestamp,
            expires_at: timestamp
                .checked_add_signed(self.ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            nonce: parsed.nonce.map(str::to_string),
            public_key: public_key.to_vec(),
        })
    }
}

struct ParsedMessage<'a> {
    issuer: &'a str,
    nonce: Option<&'a str>,
    timestamp: &'a str,
}

/// Split a signed message into its fields
///
/// Only the leading separators count: the RFC 3339 timestamp at the end
/// carries colons of its own.
fn parse_message(message: &str, with_nonce: bool) -> Result<ParsedMessage<'_>, AuthError> {
    let (issuer, rest) = message
        .split_once(':')
        .ok_or(AuthError::MalformedMessage)?;

    let (nonce, timestamp) = if with_nonce {
        let (nonce, timestamp) = rest.split_once(':').ok_or(AuthError::MalformedMessage)?;
        if nonce.is_empty() {
            return Err(AuthError::MalformedMessage);
        }
        (Some(nonce), timestamp)
    } else {
        (None, rest)
    };

    // An RFC 3339 timestamp starts with its year; anything else means extra fields
    if issuer.is_empty() || !timestamp.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(AuthError::MalformedMessage);
    }

    Ok(ParsedMessage {
        issuer,
        nonce,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::keys::SigningKeys;
    use ed25519_dalek::{Signer, SigningKey};
    use std::sync::Arc;

    const ISSUER: &str = "TON-OAUTH";
    const PRIVATE_PEM: &str = include_str!("../../tests/fixtures/signing_private.pem");
    const PUBLIC_PEM: &str = include_str!("../../tests/fixtures/signing_public.pem");

    fn wallet() -> SigningKey {
        SigningKey::from_bytes(&[42u8; 32])
    }

    fn challenges() -> ChallengeIssuer {
        let keys = SigningKeys::from_pem(PRIVATE_PEM, PUBLIC_PEM, "main-key").unwrap();
        ChallengeIssuer::new(Duration::seconds(120), Arc::new(keys))
    }

    fn verifier() -> AssertionVerifier {
        AssertionVerifier::new(ISSUER, Duration::seconds(120), challenges())
    }

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn signed(message: &str) -> (Vec<u8>, Vec<u8>) {
        let key = wallet();
        let signature = key.sign(message.as_bytes()).to_bytes().to_vec();
        (signature, key.verifying_key().to_bytes().to_vec())
    }

    #[test]
    fn test_fresh_assertion_accepted() {
        let message = "TON-OAUTH:2025-01-01T00:00:00Z";
        let (signature, public_key) = signed(message);

        let verified = verifier()
            .verify_at(message, &signature, &public_key, None, at("2025-01-01T00:01:30Z"))
            .unwrap();

        assert_eq!(verified.issuer, ISSUER);
        assert_eq!(verified.timestamp, at("2025-01-01T00:00:00Z"));
        assert_eq!(verified.expires_at, at("2025-01-01T00:02:00Z"));
        assert_eq!(verified.public_key, public_key);
        assert!(verified.nonce.is_none());
    }

    #[test]
    fn test_stale_assertion_expired() {
        let message = "TON-OAUTH:2025-01-01T00:00:00Z";
        let (signature, public_key) = signed(message);

        let result = verifier().verify_at(
            message,
            &signature,
            &public_key,
            None,
            at("2025-01-01T00:05:00Z"),
        );
        assert!(matches!(result, Err(AuthError::Expired)));
    }

    #[test]
    fn test_ttl_boundary_is_inclusive() {
        let message = "TON-OAUTH:2025-01-01T00:00:00Z";
        let (signature, public_key) = signed(message);
        let v = verifier();

        assert!(v
            .verify_at(message, &signature, &public_key, None, at("2025-01-01T00:02:00Z"))
            .is_ok());
        assert!(matches!(
            v.verify_at(message, &signature, &public_key, None, at("2025-01-01T00:02:01Z")),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn test_future_timestamp_rejected() {
        let message = "TON-OAUTH:2025-01-01T00:00:10Z";
        let (signature, public_key) = signed(message);

        let result = verifier().verify_at(
            message,
            &signature,
            &public_key,
            None,
            at("2025-01-01T00:00:00Z"),
        );
        assert!(matches!(result, Err(AuthError::FutureTimestamp)));
    }

    #[test]
    fn test_offset_timestamps_are_normalised() {
        let message = "TON-OAUTH:2025-01-01T03:00:00+03:00";
        let (signature, public_key) = signed(message);

        let verified = verifier()
            .verify_at(message, &signature, &public_key, None, at("2025-01-01T00:00:30Z"))
            .unwrap();
        assert_eq!(verified.timestamp, at("2025-01-01T00:00:00Z"));
    }

    #[test]
    fn test_signature_checked_before_content() {
        // A stale message with a bad signature reports the signature failure
        let message = "TON-OAUTH:2020-01-01T00:00:00Z";
        let (mut signature, public_key) = signed(message);
        signature[0] ^= 0xff;

        let result = verifier().verify_at(message, &signature, &public_key, None, Utc::now());
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
    }

    #[test]
    fn test_tampered_message_rejected() {
        let (signature, public_key) = signed("TON-OAUTH:2025-01-01T00:00:00Z");

        let result = verifier().verify_at(
            "TON-OAUTH:2025-01-01T00:00:01Z",
            &signature,
            &public_key,
            None,
            at("2025-01-01T00:01:00Z"),
        );
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
    }

    #[test]
    fn test_malformed_message() {
        let message = "TON-OAUTH 2025-01-01T00:00:00Z";
        let (signature, public_key) = signed(message);

        let result = verifier().verify_at(message, &signature, &public_key, None, Utc::now());
        assert!(matches!(result, Err(AuthError::MalformedMessage)));

        let message = ":2025-01-01T00:00:00Z";
        let (signature, public_key) = signed(message);
        let result = verifier().verify_at(message, &signature, &public_key, None, Utc::now());
        assert!(matches!(result, Err(AuthError::MalformedMessage)));
    }

    #[test]
    fn test_issuer_is_case_sensitive() {
        let message = "ton-oauth:2025-01-01T00:00:00Z";
        let (signature, public_key) = signed(message);

        let result = verifier().verify_at(
            message,
            &signature,
            &public_key,
            None,
            at("2025-01-01T00:01:00Z"),
        );
        assert!(matches!(result, Err(AuthError::IssuerMismatch)));
    }

    #[test]
    fn test_malformed_timestamp() {
        let message = "TON-OAUTH:1735689600";
        let (signature, public_key) = signed(message);

        let result = verifier().verify_at(message, &signature, &public_key, None, Utc::now());
        assert!(matches!(result, Err(AuthError::MalformedTimestamp)));
    }

    #[test]
    fn test_challenge_bound_message() {
        let v = verifier();
        let issued_at = at("2025-01-01T00:00:00Z");
        let challenge = v
            .challenges
            .issue_at("https://app.example.com", None, issued_at)
            .unwrap();
        let message = format!("TON-OAUTH:{}:2025-01-01T00:00:30Z", challenge.nonce);
        let (signature, public_key) = signed(&message);
        let now = at("2025-01-01T00:00:45Z");

        let verified = v
            .verify_at(&message, &signature, &public_key, Some(challenge.nonce.as_str()), now)
            .unwrap();
        assert_eq!(verified.nonce.as_deref(), Some(challenge.nonce.as_str()));

        let result = v.verify_at(&message, &signature, &public_key, Some("other"), now);
        assert!(matches!(result, Err(AuthError::ChallengeMismatch)));
    }

    #[test]
    fn test_never_issued_nonce_rejected() {
        let message = "TON-OAUTH:attacker-chosen:2025-01-01T00:00:00Z";
        let (signature, public_key) = signed(message);

        let result = verifier()
            .with_challenge_binding(true)
            .verify_at(
                message,
                &signature,
                &public_key,
                Some("attacker-chosen"),
                at("2025-01-01T00:00:10Z"),
            );
        assert!(matches!(result, Err(AuthError::UnknownChallenge)));
    }

    #[test]
    fn test_expired_challenge_rejected() {
        let v = verifier();
        let challenge = v
            .challenges
            .issue_at("https://app.example.com", None, at("2025-01-01T00:00:00Z"))
            .unwrap();
        // The assertion itself is fresh; only the challenge is stale
        let message = format!("TON-OAUTH:{}:2025-01-01T00:02:30Z", challenge.nonce);
        let (signature, public_key) = signed(&message);

        let result = v.verify_at(
            &message,
            &signature,
            &public_key,
            Some(challenge.nonce.as_str()),
            at("2025-01-01T00:02:40Z"),
        );
        assert!(matches!(result, Err(AuthError::ChallengeExpired)));
    }

    #[test]
    fn test_extra_field_without_nonce_is_malformed() {
        let message = "TON-OAUTH:foo:2025-01-01T00:00:00Z";
        let (signature, public_key) = signed(message);

        let result = verifier().verify_at(
            message,
            &signature,
            &public_key,
            None,
            at("2025-01-01T00:00:10Z"),
        );
        assert!(matches!(result, Err(AuthError::MalformedMessage)));
    }

    #[test]
    fn test_binding_required() {
        let message = "TON-OAUTH:2025-01-01T00:00:00Z";
        let (signature, public_key) = signed(message);
        let v = verifier().with_challenge_binding(true);

        let result = v.verify_at(
            message,
            &signature,
            &public_key,
            None,
            at("2025-01-01T00:00:45Z"),
        );
        assert!(matches!(result, Err(AuthError::InvalidRequest(_))));
    }
}
