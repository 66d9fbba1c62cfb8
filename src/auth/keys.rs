//! RSA key material for access token signing
//!
//! Keys are loaded once at startup and shared read-only across requests.
//! The private half never leaves [`SigningKeys`]; everything that is handed
//! out (token verification, JWKS publication) goes through [`VerificationKey`].

use std::fmt;
use std::path::{Path, PathBuf};

use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use thiserror::Error;

/// Key loading errors (fatal at startup)
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Failed to read key file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid PKCS#8 private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid SubjectPublicKeyInfo public key: {0}")]
    InvalidPublicKey(String),

    #[error("Public key does not match the private key")]
    KeyPairMismatch,
}

/// Public half of the signing key, identified by `kid`
#[derive(Clone)]
pub struct VerificationKey {
    key_id: String,
    public_key: RsaPublicKey,
    decoding_key: DecodingKey,
}

impl VerificationKey {
    pub fn new(public_key: RsaPublicKey, key_id: impl Into<String>) -> Self {
        let decoding_key = DecodingKey::from_rsa_raw_components(
            &public_key.n().to_bytes_be(),
            &public_key.e().to_bytes_be(),
        );
        Self {
            key_id: key_id.into(),
            public_key,
            decoding_key,
        }
    }

    /// Parse a PEM `PUBLIC KEY` (SubjectPublicKeyInfo) document
    pub fn from_pem(public_pem: &str, key_id: impl Into<String>) -> Result<Self, KeyError> {
        let public_key = RsaPublicKey::from_public_key_pem(public_pem)
            .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?;
        Ok(Self::new(public_key, key_id))
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.key_id)
            .field("bits", &(self.public_key.size() * 8))
            .finish()
    }
}

/// The deployment's single active signing key pair
#[derive(Clone)]
pub struct SigningKeys {
    encoding_key: EncodingKey,
    verification: VerificationKey,
}

impl SigningKeys {
    /// Load the key pair from PEM files on disk
    pub fn load(
        private_key_path: &Path,
        public_key_path: &Path,
        key_id: impl Into<String>,
    ) -> Result<Self, KeyError> {
        let private_pem = read_pem(private_key_path)?;
        let public_pem = read_pem(public_key_path)?;
        Self::from_pem(&private_pem, &public_pem, key_id)
    }

    /// Build the key pair from a PKCS#8 `PRIVATE KEY` and an SPKI `PUBLIC KEY`
    pub fn from_pem(
        private_pem: &str,
        public_pem: &str,
        key_id: impl Into<String>,
    ) -> Result<Self, KeyError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(private_pem)
            .map_err(|e| KeyError::InvalidPrivateKey(e.to_string()))?;
        let verification = VerificationKey::from_pem(public_pem, key_id)?;

        if RsaPublicKey::from(&private_key) != *verification.public_key() {
            return Err(KeyError::KeyPairMismatch);
        }

        let der = private_key
            .to_pkcs1_der()
            .map_err(|e| KeyError::InvalidPrivateKey(e.to_string()))?;
        let encoding_key = EncodingKey::from_rsa_der(der.as_bytes());

        Ok(Self {
            encoding_key,
            verification,
        })
    }

    pub fn key_id(&self) -> &str {
        self.verification.key_id()
    }

    pub fn verification_key(&self) -> &VerificationKey {
        &self.verification
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }
}

impl fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeys")
            .field("kid", &self.key_id())
            .finish_non_exhaustive()
    }
}

fn read_pem(path: &Path) -> Result<String, KeyError> {
    std::fs::read_to_string(path).map_err(|source| KeyError::Read {
        path: path.to_path_buf(),
        source,
    })
}
