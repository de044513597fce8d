//! JWK key material conversion.
//!
//! Turns a published key record (base64url modulus and exponent) into an RSA
//! public key usable for signature verification. Conversion is pure; records
//! are converted one at a time so a single bad entry never poisons the set.

use common::jwt::{decode_base64url, rsa_algorithm};
use jsonwebtoken::DecodingKey;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A single entry of a JWKS document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Key ID - used to select the correct key for verification.
    pub kid: String,

    /// Key type (must be "RSA").
    pub kty: String,

    /// Declared algorithm, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Key use (normally "sig").
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,

    /// Modulus, unpadded base64url big-endian.
    #[serde(default)]
    pub n: String,

    /// Public exponent, unpadded base64url big-endian.
    #[serde(default)]
    pub e: String,
}

/// Why a key record could not be turned into a public key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyMaterialError {
    #[error("key material invalid: {0}")]
    KeyMaterialInvalid(String),

    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("unsupported key algorithm: {0}")]
    UnsupportedKeyAlgorithm(String),
}

/// An RSA public key ready for signature verification.
///
/// Immutable after construction and shared across concurrent verifications
/// behind an `Arc`.
#[derive(Clone)]
pub struct PublicKey {
    kid: String,
    key: RsaPublicKey,
    decoding_key: DecodingKey,
}

impl PublicKey {
    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn modulus(&self) -> &BigUint {
        self.key.n()
    }

    pub fn exponent(&self) -> &BigUint {
        self.key.e()
    }

    /// Size of the modulus in bits.
    pub fn modulus_bits(&self) -> usize {
        self.key.n().bits()
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("kid", &self.kid)
            .field("modulus_bits", &self.modulus_bits())
            .field("exponent", &self.key.e().to_string())
            .finish()
    }
}

/// Convert one key record into a public key.
///
/// # Errors
///
/// - `UnsupportedKeyType` if `kty` is not "RSA"
/// - `UnsupportedKeyAlgorithm` if `alg` is declared and not RS/PS
/// - `KeyMaterialInvalid` if `n` or `e` is empty, not unpadded base64url, or
///   does not form a valid RSA public key
pub fn convert(record: &KeyRecord) -> Result<PublicKey, KeyMaterialError> {
    if record.kty != "RSA" {
        return Err(KeyMaterialError::UnsupportedKeyType(record.kty.clone()));
    }

    if let Some(alg) = record.alg.as_deref() {
        if rsa_algorithm(alg).is_none() {
            return Err(KeyMaterialError::UnsupportedKeyAlgorithm(alg.to_string()));
        }
    }

    let n = decode_component("modulus", &record.n)?;
    let e = decode_component("exponent", &record.e)?;

    let key = RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e))
        .map_err(|err| KeyMaterialError::KeyMaterialInvalid(err.to_string()))?;

    let decoding_key =
        DecodingKey::from_rsa_raw_components(&key.n().to_bytes_be(), &key.e().to_bytes_be());

    Ok(PublicKey {
        kid: record.kid.clone(),
        key,
        decoding_key,
    })
}

fn decode_component(name: &str, value: &str) -> Result<Vec<u8>, KeyMaterialError> {
    if value.is_empty() {
        return Err(KeyMaterialError::KeyMaterialInvalid(format!(
            "{name} is empty"
        )));
    }

    let bytes = decode_base64url(value)
        .map_err(|e| KeyMaterialError::KeyMaterialInvalid(format!("{name}: {e}")))?;

    if bytes.iter().all(|b| *b == 0) {
        return Err(KeyMaterialError::KeyMaterialInvalid(format!(
            "{name} is zero"
        )));
    }

    Ok(bytes)
}

/// Convert every record, skipping (and logging) the ones that fail.
///
/// A later record with the same `kid` replaces an earlier one.
pub fn convert_all(records: &[KeyRecord]) -> HashMap<String, Arc<PublicKey>> {
    let mut keys = HashMap::with_capacity(records.len());

    for record in records {
        match convert(record) {
            Ok(key) => {
                if keys.insert(record.kid.clone(), Arc::new(key)).is_some() {
                    tracing::debug!(target: "api.auth.keys", kid = %record.kid, "Duplicate kid in key set, keeping the later entry");
                }
            }
            Err(e) => {
                tracing::warn!(target: "api.auth.keys", kid = %record.kid, error = %e, "Skipping unusable key record");
            }
        }
    }

    keys
}
