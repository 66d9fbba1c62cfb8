use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{AccountState, OracleError, WalletOracle};
use crate::auth::WalletAddress;

pub const MAINNET_URL: &str = "https://toncenter.com/api/v2";
pub const TESTNET_URL: &str = "https://testnet.toncenter.com/api/v2";

/// Liveness via the toncenter HTTP API v2 (`getAddressState`)
#[derive(Clone)]
pub struct ToncenterOracle {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ToncenterResponse {
    ok: bool,
    result: Option<String>,
    error: Option<String>,
}

impl ToncenterOracle {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl WalletOracle for ToncenterOracle {
    async fn account_state(&self, address: &WalletAddress) -> Result<AccountState, OracleError> {
        let mut request = self
            .client
            .get(format!("{}/getAddressState", self.base_url))
            .query(&[("address", address.to_string())]);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::UnexpectedStatus(status.as_u16()));
        }

        let body: ToncenterResponse = response.json().await?;
        if !body.ok {
            return Err(OracleError::Upstream(
                body.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        let state = body
            .result
            .ok_or_else(|| OracleError::InvalidResponse("missing result".to_string()))?;
        parse_address_state(&state)
    }

    fn name(&self) -> &'static str {
        "toncenter"
    }
}

/// Map a `getAddressState` result onto [`AccountState`]
///
/// toncenter reports never-deployed and deleted accounts both as
/// `uninitialized`.
fn parse_address_state(state: &str) -> Result<AccountState, OracleError> {
    match state {
        "active" => Ok(AccountState::Active),
        "uninitialized" | "uninit" => Ok(AccountState::Uninitialized),
        "frozen" => Ok(AccountState::Frozen),
        other => Err(OracleError::InvalidResponse(format!(
            "unknown account state '{}'",
            other
        ))),
    }
}
