//! Configuration management for the TON OAuth service
//!
//! This module handles loading and validating configuration from environment variables
//! (and a `.env` file when present), with support for different environments
//! (development, staging, production).

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::ledger;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Upper bound for every lifetime setting (one day)
pub const MAX_TTL_SECONDS: i64 = 86_400;

/// Upper bound for the ledger lookup timeout
pub const MAX_LEDGER_TIMEOUT_SECONDS: i64 = 300;

/// Application environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }
}

impl Environment {
    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Get the environment name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

/// Which ledger oracle answers wallet liveness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OracleKind {
    #[default]
    Toncenter,
    TonApi,
    /// Every wallet is reported active. Development only.
    StaticActive,
}

impl FromStr for OracleKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "toncenter" => Ok(OracleKind::Toncenter),
            "tonapi" => Ok(OracleKind::TonApi),
            "static-active" | "static" => Ok(OracleKind::StaticActive),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid ledger oracle: '{}'. Expected: toncenter, tonapi, or static-active",
                s
            ))),
        }
    }
}

impl OracleKind {
    /// Public endpoint used when `LEDGER_API_URL` is not set
    pub fn default_url(&self, testnet: bool) -> Option<&'static str> {
        match (self, testnet) {
            (OracleKind::Toncenter, false) => Some(ledger::toncenter::MAINNET_URL),
            (OracleKind::Toncenter, true) => Some(ledger::toncenter::TESTNET_URL),
            (OracleKind::TonApi, false) => Some(ledger::tonapi::MAINNET_URL),
            (OracleKind::TonApi, true) => Some(ledger::tonapi::TESTNET_URL),
            (OracleKind::StaticActive, _) => None,
        }
    }
}

/// A value that must not show up in logs
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Current environment
    pub environment: Environment,

    /// Interface to bind
    pub host: String,

    /// Server port
    pub port: u16,

    /// PKCS#8 PEM private signing key
    pub private_key_path: PathBuf,

    /// SubjectPublicKeyInfo PEM public key
    pub public_key_path: PathBuf,

    /// Issuer expected in signed messages and written into tokens
    pub issuer: String,

    /// `kid` of the signing key
    pub key_id: String,

    /// Challenge lifetime in seconds (default: 120)
    pub challenge_ttl_seconds: i64,

    /// Maximum age of a signed assertion in seconds (default: 120)
    pub assertion_ttl_seconds: i64,

    /// Access token TTL in seconds (default: 300 = 5 minutes)
    pub access_token_ttl_seconds: i64,

    /// Wallet liveness backend
    pub ledger_oracle: OracleKind,

    /// Ledger oracle base URL
    pub ledger_api_url: Option<String>,

    /// Ledger oracle API key
    pub ledger_api_key: Option<Secret>,

    /// Per-lookup oracle timeout in seconds (default: 10)
    pub ledger_timeout_seconds: u64,

    /// Derive testnet addresses and use testnet oracle defaults
    pub ton_testnet: bool,

    /// Require `issuer:nonce:timestamp` messages
    pub require_challenge_binding: bool,

    /// Make each assertion exchangeable for a token only once
    pub replay_protection: bool,

    /// Maximum consumed assertions tracked by the replay guard
    pub replay_cache_capacity: u64,

    /// CORS allowed origins
    pub cors_allowed_origins: Option<String>,

    /// Log level (RUST_LOG)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .map(|s| s.parse())
            .unwrap_or(Ok(Environment::Development))?;

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = lookup("PORT")
            .or_else(|| lookup("HTTP_SERVER_PORT"))
            .unwrap_or_else(|| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let private_key_path = lookup("PRIVATE_KEY_PATH")
            .unwrap_or_else(|| "key/private.pem".to_string())
            .into();

        let public_key_path = lookup("PUBLIC_KEY_PATH")
            .unwrap_or_else(|| "key/public.pem".to_string())
            .into();

        let issuer = lookup("ISSUER").unwrap_or_else(|| "TON-OAUTH".to_string());
        if issuer.is_empty() || issuer.contains(':') {
            return Err(ConfigError::InvalidValue(
                "ISSUER must be non-empty and must not contain ':'".to_string(),
            ));
        }

        let key_id = lookup("KEY_ID")
            .or_else(|| lookup("KEY_NAME"))
            .unwrap_or_else(|| "main-key".to_string());

        let challenge_ttl_seconds =
            positive_seconds(&lookup, "CHALLENGE_TTL_SECONDS", 120, MAX_TTL_SECONDS)?;
        let assertion_ttl_seconds =
            positive_seconds(&lookup, "ASSERTION_TTL_SECONDS", 120, MAX_TTL_SECONDS)?;
        let access_token_ttl_seconds =
            positive_seconds(&lookup, "ACCESS_TOKEN_TTL_SECONDS", 300, MAX_TTL_SECONDS)?;
        let ledger_timeout_seconds = positive_seconds(
            &lookup,
            "LEDGER_TIMEOUT_SECONDS",
            10,
            MAX_LEDGER_TIMEOUT_SECONDS,
        )? as u64;

        let ledger_oracle = lookup("LEDGER_ORACLE")
            .map(|s| s.parse())
            .unwrap_or(Ok(OracleKind::default()))?;

        let ledger_api_url = lookup("LEDGER_API_URL").filter(|s| !s.is_empty());
        let ledger_api_key = lookup("LEDGER_API_KEY")
            .filter(|s| !s.is_empty())
            .map(Secret::new);

        let ton_testnet = flag(&lookup, "TON_TESTNET")?;
        let require_challenge_binding = flag(&lookup, "REQUIRE_CHALLENGE_BINDING")?;
        let replay_protection = flag(&lookup, "REPLAY_PROTECTION")?;

        let replay_cache_capacity = match lookup("REPLAY_CACHE_CAPACITY") {
            None => 100_000,
            Some(raw) => match raw.parse::<u64>() {
                Ok(value) if value > 0 => value,
                _ => {
                    return Err(ConfigError::InvalidValue(format!(
                        "REPLAY_CACHE_CAPACITY must be a positive integer, got '{}'",
                        raw
                    )))
                }
            },
        };

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS").filter(|s| !s.is_empty());

        let log_level = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        Ok(Config {
            environment,
            host,
            port,
            private_key_path,
            public_key_path,
            issuer,
            key_id,
            challenge_ttl_seconds,
            assertion_ttl_seconds,
            access_token_ttl_seconds,
            ledger_oracle,
            ledger_api_url,
            ledger_api_key,
            ledger_timeout_seconds,
            ton_testnet,
            require_challenge_binding,
            replay_protection,
            replay_cache_capacity,
            cors_allowed_origins,
            log_level,
        })
    }

    /// Base URL the configured oracle talks to
    pub fn ledger_url(&self) -> Option<String> {
        self.ledger_api_url.clone().or_else(|| {
            self.ledger_oracle
                .default_url(self.ton_testnet)
                .map(str::to_string)
        })
    }
}

fn positive_seconds<F>(lookup: &F, key: &str, default: i64, max: i64) -> Result<i64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.parse::<i64>() {
        Ok(value) if value > 0 && value <= max => Ok(value),
        _ => Err(ConfigError::InvalidValue(format!(
            "{} must be between 1 and {} seconds, got '{}'",
            key, max, raw
        ))),
    }
}

fn flag<F>(lookup: &F, key: &str) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).as_deref().map(str::to_lowercase).as_deref() {
        None | Some("") | Some("0") | Some("false") | Some("no") => Ok(false),
        Some("1") | Some("true") | Some("yes") => Ok(true),
        Some(other) => Err(ConfigError::InvalidValue(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}
