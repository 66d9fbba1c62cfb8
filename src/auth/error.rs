//! Authentication error taxonomy
//!
//! Every rejection the challenge-response flow can produce. Display strings are
//! safe to return to callers: they never carry key bytes, signatures, or
//! upstream error bodies.

use thiserror::Error;

use super::crypto::CryptoError;
use super::jwt::JwtError;
use crate::ledger::OracleError;

/// Auth flow errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid message format, expected 'issuer:timestamp'")]
    MalformedMessage,

    #[error("Invalid issuer")]
    IssuerMismatch,

    #[error("Invalid timestamp format")]
    MalformedTimestamp,

    #[error("Timestamp is from the future")]
    FutureTimestamp,

    #[error("Expired")]
    Expired,

    #[error("Signed message is not bound to the presented challenge")]
    ChallengeMismatch,

    #[error("Challenge was not issued by this server")]
    UnknownChallenge,

    #[error("Challenge expired")]
    ChallengeExpired,

    #[error("Signed message was already exchanged for a token")]
    AssertionReplayed,

    #[error("Wallet oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("Wallet not found")]
    WalletNotFound,

    #[error("Wallet is not active")]
    WalletInactive,

    #[error("Token signing failed")]
    SigningFailure(String),

    #[error("Unexpected signing algorithm")]
    AlgorithmMismatch,

    #[error("Invalid token claims")]
    InvalidClaims(String),

    #[error("Secure random source unavailable")]
    RandomnessFailure(String),
}

impl AuthError {
    /// Stable machine-readable reason, used in logs and API error codes
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::InvalidRequest(_) => "INVALID_REQUEST",
            AuthError::InvalidSignature => "INVALID_SIGNATURE",
            AuthError::MalformedMessage => "MALFORMED_MESSAGE",
            AuthError::IssuerMismatch => "ISSUER_MISMATCH",
            AuthError::MalformedTimestamp => "MALFORMED_TIMESTAMP",
            AuthError::FutureTimestamp => "FUTURE_TIMESTAMP",
            AuthError::Expired => "EXPIRED",
            AuthError::ChallengeMismatch => "CHALLENGE_MISMATCH",
            AuthError::UnknownChallenge => "UNKNOWN_CHALLENGE",
            AuthError::ChallengeExpired => "CHALLENGE_EXPIRED",
            AuthError::AssertionReplayed => "ASSERTION_REPLAYED",
            AuthError::OracleUnavailable(_) => "ORACLE_UNAVAILABLE",
            AuthError::WalletNotFound => "WALLET_NOT_FOUND",
            AuthError::WalletInactive => "WALLET_INACTIVE",
            AuthError::SigningFailure(_) => "SIGNING_FAILURE",
            AuthError::AlgorithmMismatch => "ALGORITHM_MISMATCH",
            AuthError::InvalidClaims(_) => "INVALID_CLAIMS",
            AuthError::RandomnessFailure(_) => "RANDOMNESS_FAILURE",
        }
    }

    /// Server-side failures that are not the caller's fault
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AuthError::SigningFailure(_) | AuthError::RandomnessFailure(_)
        )
    }
}

impl From<CryptoError> for AuthError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::InvalidEncoding(msg) => AuthError::InvalidRequest(msg),
            CryptoError::InvalidPublicKey(_)
            | CryptoError::InvalidSignatureFormat(_)
            | CryptoError::VerificationFailed => AuthError::InvalidSignature,
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::EncodingFailed(msg) => AuthError::SigningFailure(msg),
            JwtError::AlgorithmMismatch(_) => AuthError::AlgorithmMismatch,
            JwtError::TokenExpired => AuthError::Expired,
            JwtError::InvalidSignature => AuthError::InvalidSignature,
            JwtError::InvalidClaims(msg) | JwtError::DecodingFailed(msg) => {
                AuthError::InvalidClaims(msg)
            }
        }
    }
}

impl From<OracleError> for AuthError {
    fn from(e: OracleError) -> Self {
        AuthError::OracleUnavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_errors_collapse_to_invalid_signature() {
        let err: AuthError = CryptoError::VerificationFailed.into();
        assert!(matches!(err, AuthError::InvalidSignature));

        let err: AuthError = CryptoError::InvalidPublicKey("bad point".to_string()).into();
        assert!(matches!(err, AuthError::InvalidSignature));

        let err: AuthError = CryptoError::InvalidEncoding("bad".to_string()).into();
        assert!(matches!(err, AuthError::InvalidRequest(_)));
    }

    #[test]
    fn test_internal_errors() {
        assert!(AuthError::SigningFailure("x".to_string()).is_internal());
        assert!(AuthError::RandomnessFailure("x".to_string()).is_internal());
        assert!(!AuthError::Expired.is_internal());
        assert!(!AuthError::OracleUnavailable("x".to_string()).is_internal());
    }

    #[test]
    fn test_display_does_not_leak_detail() {
        let err = AuthError::SigningFailure("RSA key material 0xdeadbeef".to_string());
        assert!(!err.to_string().contains("deadbeef"));
    }
}
