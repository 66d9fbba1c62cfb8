//! Authentication module for the TON OAuth service
//!
//! Provides wallet-based authentication using TON ed25519 keys.
//! - Stateless challenge-response with signed timestamps
//! - Wallet liveness gating against the ledger
//! - RS256 access tokens and JWKS publication

mod assertion;
mod challenge;
mod crypto;
mod error;
mod jwks;
mod jwt;
mod keys;
mod liveness;
mod replay;
mod service;

pub use assertion::{AssertionVerifier, VerifiedAssertion};
pub use challenge::{generate_random_string, Challenge, ChallengeIssuer};
pub use crypto::{
    decode_public_key, decode_signature, verify_wallet_signature, CryptoError, WalletAddress,
};
pub use error::AuthError;
pub use jwks::{publish as publish_jwks, Jwk, Jwks, KeyUse};
pub use jwt::{
    generate_access_token, generate_access_token_at, verify_access_token, AccessClaims, JwtError,
    VerifiedToken, TOKEN_ALGORITHM,
};
pub use keys::{KeyError, SigningKeys, VerificationKey};
pub use liveness::{LivenessGate, DEFAULT_ORACLE_TIMEOUT};
pub use replay::{InMemoryReplayGuard, ReplayGuard};
pub use service::{AuthService, AuthSettings, IssuedToken, WalletVerification};
