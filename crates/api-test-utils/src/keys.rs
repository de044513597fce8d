//! RSA test keypairs.
//!
//! Two fixed 2048-bit keys are checked in under `fixtures/`. They exist only
//! to sign test tokens; a keypair is identified by whatever `kid` the test
//! gives it, so the same key material can be published under several ids.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::OnceLock;

const PRIMARY_PEM: &str = include_str!("../fixtures/rsa_primary.pem");
const SECONDARY_PEM: &str = include_str!("../fixtures/rsa_secondary.pem");

/// Parsed key material, shared by every keypair built from the same fixture.
#[derive(Clone)]
struct KeyMaterial {
    public: RsaPublicKey,
    encoding_key: EncodingKey,
}

fn load(pem: &str) -> KeyMaterial {
    let private = RsaPrivateKey::from_pkcs1_pem(pem).expect("fixture PEM should parse");
    let encoding_key =
        EncodingKey::from_rsa_pem(pem.as_bytes()).expect("fixture PEM should load for signing");

    KeyMaterial {
        public: RsaPublicKey::from(&private),
        encoding_key,
    }
}

fn primary_material() -> &'static KeyMaterial {
    static MATERIAL: OnceLock<KeyMaterial> = OnceLock::new();
    MATERIAL.get_or_init(|| load(PRIMARY_PEM))
}

fn secondary_material() -> &'static KeyMaterial {
    static MATERIAL: OnceLock<KeyMaterial> = OnceLock::new();
    MATERIAL.get_or_init(|| load(SECONDARY_PEM))
}

/// An RSA keypair published under a chosen `kid`.
#[derive(Clone)]
pub struct TestKeypair {
    kid: String,
    material: KeyMaterial,
}

impl TestKeypair {
    /// The primary fixture key under `kid`.
    pub fn primary(kid: &str) -> Self {
        Self {
            kid: kid.to_string(),
            material: primary_material().clone(),
        }
    }

    /// The secondary fixture key under `kid`; signatures from it never verify
    /// against the primary key.
    pub fn secondary(kid: &str) -> Self {
        Self {
            kid: kid.to_string(),
            material: secondary_material().clone(),
        }
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Big-endian modulus bytes.
    pub fn modulus_bytes(&self) -> Vec<u8> {
        self.material.public.n().to_bytes_be()
    }

    /// Modulus as unpadded base64url, the JWK `n` member.
    pub fn modulus_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.modulus_bytes())
    }

    /// Exponent as unpadded base64url, the JWK `e` member.
    pub fn exponent_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.material.public.e().to_bytes_be())
    }

    /// The public half as a JWK object.
    pub fn jwk(&self) -> Value {
        json!({
            "kty": "RSA",
            "use": "sig",
            "alg": "RS256",
            "kid": self.kid,
            "n": self.modulus_b64(),
            "e": self.exponent_b64(),
        })
    }

    /// A JOSE header for `alg` carrying this keypair's `kid`.
    pub fn header(&self, alg: Algorithm) -> Header {
        let mut header = Header::new(alg);
        header.kid = Some(self.kid.clone());
        header
    }

    /// Sign `claims` with RS256.
    pub fn sign<T: Serialize>(&self, claims: &T) -> String {
        self.sign_with_header(&self.header(Algorithm::RS256), claims)
    }

    /// Sign `claims` with any RS or PS algorithm.
    pub fn sign_with_algorithm<T: Serialize>(&self, alg: Algorithm, claims: &T) -> String {
        self.sign_with_header(&self.header(alg), claims)
    }

    /// Sign `claims` with RS256 and no `kid` in the header.
    pub fn sign_without_kid<T: Serialize>(&self, claims: &T) -> String {
        self.sign_with_header(&Header::new(Algorithm::RS256), claims)
    }

    /// Sign `claims` under an arbitrary header.
    pub fn sign_with_header<T: Serialize>(&self, header: &Header, claims: &T) -> String {
        jsonwebtoken::encode(header, claims, &self.material.encoding_key)
            .expect("test token should sign")
    }
}
