//! Authentication service
//!
//! Core business logic for wallet-based authentication: challenge issuance,
//! assertion verification, the wallet liveness gate and access token
//! lifecycle. Holds no mutable state apart from the optional replay guard.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};

use super::assertion::{AssertionVerifier, VerifiedAssertion};
use super::challenge::{Challenge, ChallengeIssuer};
use super::crypto::WalletAddress;
use super::error::AuthError;
use super::jwks::{self, Jwks};
use super::jwt::{generate_access_token, verify_access_token, AccessClaims, VerifiedToken};
use super::keys::SigningKeys;
use super::liveness::LivenessGate;
use super::replay::ReplayGuard;
use crate::config::Config;
use crate::ledger::WalletOracle;

/// Tunables of the auth flow
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub issuer: String,
    pub challenge_ttl: Duration,
    pub assertion_ttl: Duration,
    pub access_token_ttl: Duration,
    pub require_challenge_binding: bool,
    pub oracle_timeout: StdDuration,
    pub testnet: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            issuer: "TON-OAUTH".to_string(),
            challenge_ttl: Duration::seconds(120),
            assertion_ttl: Duration::minutes(2),
            access_token_ttl: Duration::minutes(5),
            require_challenge_binding: false,
            oracle_timeout: super::liveness::DEFAULT_ORACLE_TIMEOUT,
            testnet: false,
        }
    }
}

impl From<&Config> for AuthSettings {
    fn from(config: &Config) -> Self {
        Self {
            issuer: config.issuer.clone(),
            challenge_ttl: seconds(config.challenge_ttl_seconds),
            assertion_ttl: seconds(config.assertion_ttl_seconds),
            access_token_ttl: seconds(config.access_token_ttl_seconds),
            require_challenge_binding: config.require_challenge_binding,
            oracle_timeout: StdDuration::from_secs(config.ledger_timeout_seconds),
            testnet: config.ton_testnet,
        }
    }
}

/// Config values are bounded, but never panic on one that is not
fn seconds(value: i64) -> Duration {
    Duration::try_seconds(value).unwrap_or(Duration::MAX)
}

/// A verified assertion from a live wallet
#[derive(Debug, Clone)]
pub struct WalletVerification {
    pub wallet: WalletAddress,
    pub assertion: VerifiedAssertion,
}

/// A freshly minted access token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: AccessClaims,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    challenges: ChallengeIssuer,
    assertions: AssertionVerifier,
    liveness: LivenessGate,
    keys: Arc<SigningKeys>,
    access_token_ttl: Duration,
    replay_guard: Option<Arc<dyn ReplayGuard>>,
}

impl AuthService {
    /// Create a new AuthService
    pub fn new(settings: AuthSettings, keys: SigningKeys, oracle: Arc<dyn WalletOracle>) -> Self {
        let keys = Arc::new(keys);
        let challenges = ChallengeIssuer::new(settings.challenge_ttl, keys.clone());
        Self {
            assertions: AssertionVerifier::new(
                settings.issuer,
                settings.assertion_ttl,
                challenges.clone(),
            )
            .with_challenge_binding(settings.require_challenge_binding),
            challenges,
            liveness: LivenessGate::new(oracle, settings.oracle_timeout, settings.testnet),
            keys,
            access_token_ttl: settings.access_token_ttl,
            replay_guard: None,
        }
    }

    /// Make token issuance single-use per assertion
    pub fn with_replay_guard(mut self, guard: Arc<dyn ReplayGuard>) -> Self {
        self.replay_guard = Some(guard);
        self
    }

    pub fn issuer(&self) -> &str {
        self.assertions.issuer()
    }

    /// Issue an authorization challenge
    pub fn authorize(
        &self,
        redirect_uri: &str,
        scope: Option<&str>,
    ) -> Result<Challenge, AuthError> {
        let challenge = self.challenges.issue(redirect_uri, scope).map_err(|e| {
            if e.is_internal() {
                tracing::error!(error = %e, "Failed to generate challenge");
            } else {
                tracing::debug!(reason = e.reason(), "Challenge request rejected");
            }
            e
        })?;

        tracing::info!(client_id = %challenge.client_id, "Generated anonymous challenge");
        Ok(challenge)
    }

    /// Verify a signed assertion and confirm the signing wallet is live
    pub async fn verify_wallet(
        &self,
        message: &str,
        signature: &[u8],
        public_key: &[u8],
        nonce: Option<&str>,
    ) -> Result<WalletVerification, AuthError> {
        tracing::debug!("Starting signature verification");

        let assertion = self
            .assertions
            .verify(message, signature, public_key, nonce)
            .map_err(|e| {
                tracing::warn!(reason = e.reason(), "Assertion rejected");
                e
            })?;

        let wallet = self.liveness.address_for(&assertion.public_key);
        self.liveness.ensure_active(&wallet).await.map_err(|e| {
            tracing::warn!(wallet = %wallet, reason = e.reason(), "Wallet check failed");
            e
        })?;

        tracing::info!(wallet = %wallet, "Signature and wallet verification successful");
        Ok(WalletVerification { wallet, assertion })
    }

    /// Full exchange: verify the assertion, gate on liveness, mint a token
    pub async fn exchange_assertion(
        &self,
        message: &str,
        signature: &[u8],
        public_key: &[u8],
        nonce: Option<&str>,
    ) -> Result<IssuedToken, AuthError> {
        let verification = self
            .verify_wallet(message, signature, public_key, nonce)
            .await?;

        if let Some(guard) = &self.replay_guard {
            let remaining = remaining_until(verification.assertion.expires_at, Utc::now());
            guard.check_and_mark(signature, remaining).await.map_err(|e| {
                tracing::warn!(wallet = %verification.wallet, "Assertion replay rejected");
                e
            })?;
        }

        let issued = self.mint_token()?;
        tracing::info!(
            wallet = %verification.wallet,
            jti = %issued.claims.jti,
            kid = self.keys.key_id(),
            "Issued access token"
        );
        Ok(issued)
    }

    /// Sign a new access token for the configured issuer
    pub fn mint_token(&self) -> Result<IssuedToken, AuthError> {
        let (token, claims) =
            generate_access_token(&self.keys, self.issuer(), self.access_token_ttl).map_err(|e| {
                tracing::error!(kid = self.keys.key_id(), error = %e, "Token signing failed");
                AuthError::from(e)
            })?;
        Ok(IssuedToken { token, claims })
    }

    /// Public key set for token verification
    pub fn jwks(&self) -> Jwks {
        jwks::publish(self.keys.verification_key())
    }

    /// Validate a previously issued access token
    pub fn verify_token(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        verify_access_token(token, self.keys.verification_key()).map_err(|e| {
            tracing::warn!(error = %e, "Token verification failed");
            AuthError::from(e)
        })
    }
}

fn remaining_until(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> StdDuration {
    (expires_at - now).to_std().unwrap_or(StdDuration::ZERO)
}
