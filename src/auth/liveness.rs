//! Wallet liveness gate
//!
//! Derives the wallet address for a public key and asks the configured ledger
//! oracle whether it is an active account. This is the only call in the auth
//! flow that leaves the process, so it carries its own timeout.

use std::sync::Arc;
use std::time::Duration;

use super::crypto::WalletAddress;
use super::error::AuthError;
use crate::ledger::{AccountState, WalletOracle};

pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct LivenessGate {
    oracle: Arc<dyn WalletOracle>,
    timeout: Duration,
    testnet: bool,
}

impl LivenessGate {
    pub fn new(oracle: Arc<dyn WalletOracle>, timeout: Duration, testnet: bool) -> Self {
        Self {
            oracle,
            timeout,
            testnet,
        }
    }

    /// Address the given public key controls on this network
    pub fn address_for(&self, public_key: &[u8]) -> WalletAddress {
        WalletAddress::from_public_key(public_key, self.testnet)
    }

    /// Single oracle round trip, bounded by the gate timeout
    ///
    /// Dropping the returned future abandons the in-flight request.
    pub async fn account_state(&self, address: &WalletAddress) -> Result<AccountState, AuthError> {
        match tokio::time::timeout(self.timeout, self.oracle.account_state(address)).await {
            Ok(Ok(state)) => Ok(state),
            Ok(Err(e)) => {
                tracing::warn!(oracle = self.oracle.name(), wallet = %address, error = %e, "Wallet oracle failed");
                Err(e.into())
            }
            Err(_) => {
                tracing::warn!(
                    oracle = self.oracle.name(),
                    wallet = %address,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Wallet oracle timed out"
                );
                Err(AuthError::OracleUnavailable("request timed out".to_string()))
            }
        }
    }

    /// `true` only for active accounts; oracle failures stay errors
    pub async fn is_active(&self, address: &WalletAddress) -> Result<bool, AuthError> {
        Ok(self.account_state(address).await? == AccountState::Active)
    }

    /// Reject anything but an active account, saying why
    pub async fn ensure_active(&self, address: &WalletAddress) -> Result<(), AuthError> {
        match self.account_state(address).await? {
            AccountState::Active => Ok(()),
            AccountState::NotFound => Err(AuthError::WalletNotFound),
            AccountState::Uninitialized | AccountState::Frozen => Err(AuthError::WalletInactive),
        }
    }
}
