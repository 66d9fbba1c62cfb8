use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{AccountState, OracleError, WalletOracle};
use crate::auth::WalletAddress;

pub const MAINNET_URL: &str = "https://tonapi.io";
pub const TESTNET_URL: &str = "https://testnet.tonapi.io";

/// Liveness via the tonapi indexer (`/v2/accounts/{id}`)
#[derive(Clone)]
pub struct TonApiOracle {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    status: String,
}

impl TonApiOracle {
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
impl WalletOracle for TonApiOracle {
    async fn account_state(&self, address: &WalletAddress) -> Result<AccountState, OracleError> {
        let mut request = self
            .client
            .get(format!("{}/v2/accounts/{}", self.base_url, address.raw()));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => return Ok(AccountState::NotFound),
            status if !status.is_success() => {
                return Err(OracleError::UnexpectedStatus(status.as_u16()))
            }
            _ => {}
        }

        let account: AccountResponse = response.json().await?;
        parse_account_status(&account.status)
    }

    fn name(&self) -> &'static str {
        "tonapi"
    }
}

fn parse_account_status(status: &str) -> Result<AccountState, OracleError> {
    match status {
        "active" => Ok(AccountState::Active),
        "uninit" => Ok(AccountState::Uninitialized),
        "frozen" => Ok(AccountState::Frozen),
        "nonexist" => Ok(AccountState::NotFound),
        other => Err(OracleError::InvalidResponse(format!(
            "unknown account status '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_account_status() {
        assert_eq!(parse_account_status("active").unwrap(), AccountState::Active);
        assert_eq!(
            parse_account_status("uninit").unwrap(),
            AccountState::Uninitialized
        );
        assert_eq!(parse_account_status("frozen").unwrap(), AccountState::Frozen);
        assert_eq!(
            parse_account_status("nonexist").unwrap(),
            AccountState::NotFound
        );
        assert!(parse_account_status("").is_err());
    }

    #[test]
    fn test_account_response_ignores_extra_fields() {
        let body: AccountResponse = serde_json::from_str(
            r#"{"address":"0:72cd","balance":1500000000,"status":"active","is_wallet":true}"#,
        )
        .unwrap();
        assert_eq!(body.status, "active");
    }
}
