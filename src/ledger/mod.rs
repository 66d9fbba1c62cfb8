//! TON ledger oracles
//!
//! Wallet liveness is answered by an external service. Two HTTP backends are
//! supported behind the [`WalletOracle`] capability: the toncenter HTTP API
//! (a thin proxy over liteservers) and the tonapi indexer. Which one is used is
//! decided once at startup.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::WalletAddress;
use crate::config::{Config, OracleKind};

pub mod tonapi;
pub mod toncenter;

pub use tonapi::TonApiOracle;
pub use toncenter::ToncenterOracle;

/// On-chain state of an account as reported by an oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    Active,
    Uninitialized,
    Frozen,
    NotFound,
}

impl AccountState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountState::Active => "active",
            AccountState::Uninitialized => "uninitialized",
            AccountState::Frozen => "frozen",
            AccountState::NotFound => "not_found",
        }
    }
}

/// Oracle failures. None of these say anything about the wallet itself.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("ledger request failed: {0}")]
    Transport(String),

    #[error("ledger returned HTTP {0}")]
    UnexpectedStatus(u16),

    #[error("ledger response could not be decoded: {0}")]
    InvalidResponse(String),

    #[error("ledger rejected the request: {0}")]
    Upstream(String),
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        // Strip the URL so API keys in query strings never reach logs or callers
        let err = err.without_url();
        if err.is_decode() {
            OracleError::InvalidResponse(err.to_string())
        } else {
            OracleError::Transport(err.to_string())
        }
    }
}

/// Source of truth for wallet liveness
#[async_trait]
pub trait WalletOracle: Send + Sync {
    /// Look up the current state of `address`
    async fn account_state(&self, address: &WalletAddress) -> Result<AccountState, OracleError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Oracle that reports the same state for every address
///
/// Meant for local development where no ledger is reachable.
#[derive(Debug, Clone)]
pub struct StaticOracle {
    state: AccountState,
}

impl StaticOracle {
    pub fn new(state: AccountState) -> Self {
        Self { state }
    }

    pub fn always_active() -> Self {
        Self::new(AccountState::Active)
    }
}

#[async_trait]
impl WalletOracle for StaticOracle {
    async fn account_state(&self, _address: &WalletAddress) -> Result<AccountState, OracleError> {
        Ok(self.state)
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Build the oracle selected by configuration
pub fn from_config(config: &Config) -> Arc<dyn WalletOracle> {
    let timeout = Duration::from_secs(config.ledger_timeout_seconds);
    let api_key = config
        .ledger_api_key
        .as_ref()
        .map(|key| key.expose().to_string());
    let url = config.ledger_url().unwrap_or_default();

    match config.ledger_oracle {
        OracleKind::Toncenter => Arc::new(ToncenterOracle::new(url, api_key, timeout)),
        OracleKind::TonApi => Arc::new(TonApiOracle::new(url, api_key, timeout)),
        OracleKind::StaticActive => {
            tracing::warn!("Static ledger oracle in use: every wallet is reported active");
            Arc::new(StaticOracle::always_active())
        }
    }
}
