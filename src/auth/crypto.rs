//! TON wallet signature verification
//!
//! Verifies ed25519 signatures from TON wallets and derives the wallet
//! address a public key maps to.

use std::fmt;

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use ed25519_dalek::{Signature, VerifyingKey, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors that can occur during signature verification
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    #[error("Signature verification failed")]
    VerificationFailed,

    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),
}

/// Verify an ed25519 wallet signature over the raw message bytes
///
/// # Arguments
/// * `public_key` - 32-byte ed25519 public key
/// * `message` - The exact bytes that were signed
/// * `signature` - 64-byte ed25519 signature
pub fn verify_wallet_signature(
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<(), CryptoError> {
    let key_bytes: [u8; PUBLIC_KEY_LENGTH] = public_key.try_into().map_err(|_| {
        CryptoError::InvalidPublicKey(format!(
            "expected {} bytes, got {}",
            PUBLIC_KEY_LENGTH,
            public_key.len()
        ))
    })?;

    let signature = Signature::from_slice(signature)
        .map_err(|e| CryptoError::InvalidSignatureFormat(e.to_string()))?;

    let verifying_key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;

    // verify_strict rejects small-order keys and non-canonical signatures
    verifying_key
        .verify_strict(message, &signature)
        .map_err(|_| CryptoError::VerificationFailed)
}

/// Decode a base64 field sent by a wallet client and check its length
///
/// Wallet SDKs disagree on the alphabet and on padding, so both the standard
/// and URL-safe alphabets are accepted with or without trailing `=`.
pub fn decode_key_material(encoded: &str, expected_len: usize) -> Result<Vec<u8>, CryptoError> {
    let input = encoded.trim().trim_end_matches('=');

    let bytes = STANDARD_NO_PAD
        .decode(input)
        .or_else(|_| URL_SAFE_NO_PAD.decode(input))
        .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;

    if bytes.len() != expected_len {
        return Err(CryptoError::InvalidEncoding(format!(
            "expected {} bytes, got {}",
            expected_len,
            bytes.len()
        )));
    }

    Ok(bytes)
}

/// Decode a base64 ed25519 public key
pub fn decode_public_key(encoded: &str) -> Result<Vec<u8>, CryptoError> {
    decode_key_material(encoded, PUBLIC_KEY_LENGTH)
}

/// Decode a base64 ed25519 signature
pub fn decode_signature(encoded: &str) -> Result<Vec<u8>, CryptoError> {
    decode_key_material(encoded, SIGNATURE_LENGTH)
}

const BOUNCEABLE_TAG: u8 = 0x11;
const TESTNET_FLAG: u8 = 0x80;

/// TON wallet address derived from a public key
///
/// The account id is `sha256(public_key)` on the basechain (workchain 0).
/// `Display` renders the user-friendly bounceable form; [`WalletAddress::raw`]
/// renders `0:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletAddress {
    workchain: i8,
    account_id: [u8; 32],
    testnet: bool,
}

impl WalletAddress {
    /// Basechain, where user wallets live
    pub const BASECHAIN: i8 = 0;

    /// Derive the wallet address for a raw public key
    pub fn from_public_key(public_key: &[u8], testnet: bool) -> Self {
        let account_id: [u8; 32] = Sha256::digest(public_key).into();
        Self {
            workchain: Self::BASECHAIN,
            account_id,
            testnet,
        }
    }

    pub fn workchain(&self) -> i8 {
        self.workchain
    }

    pub fn account_id(&self) -> &[u8; 32] {
        &self.account_id
    }

    /// Raw `workchain:hex` form understood by indexers
    pub fn raw(&self) -> String {
        let hex: String = self
            .account_id
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        format!("{}:{}", self.workchain, hex)
    }

    fn friendly_bytes(&self) -> [u8; 36] {
        let mut out = [0u8; 36];
        out[0] = if self.testnet {
            BOUNCEABLE_TAG | TESTNET_FLAG
        } else {
            BOUNCEABLE_TAG
        };
        out[1] = self.workchain as u8;
        out[2..34].copy_from_slice(&self.account_id);
        let crc = crc16_xmodem(&out[..34]);
        out[34..36].copy_from_slice(&crc);
        out
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&URL_SAFE.encode(self.friendly_bytes()))
    }
}

/// Calculate CRC16-XModem checksum (used by TON user-friendly addresses)
fn crc16_xmodem(data: &[u8]) -> [u8; 2] {
    let mut crc: u16 = 0;

    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }

    // TON stores the checksum big-endian
    crc.to_be_bytes()
}
