//! JSON Web Key Set publication
//!
//! Projects the verification key into RFC 7517 form so relying parties can
//! check access tokens without calling back into the service.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rsa::traits::PublicKeyParts;
use serde::{Deserialize, Serialize};

use super::keys::VerificationKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyUse {
    Sig,
}

/// A single RSA JSON Web Key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kid: String,
    pub kty: String,
    pub alg: String,
    #[serde(rename = "use")]
    pub use_field: KeyUse,
    /// Modulus, big-endian, base64url without padding
    pub n: String,
    /// Public exponent, big-endian, base64url without padding
    pub e: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

impl From<&VerificationKey> for Jwk {
    fn from(key: &VerificationKey) -> Self {
        let public_key = key.public_key();
        Self {
            kid: key.key_id().to_string(),
            kty: "RSA".to_string(),
            alg: "RS256".to_string(),
            use_field: KeyUse::Sig,
            n: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
        }
    }
}

/// Build the key set for the active key
pub fn publish(key: &VerificationKey) -> Jwks {
    Jwks {
        keys: vec![Jwk::from(key)],
    }
}
