//! Claim builders and token manipulation helpers.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Serialize;
use serde_json::Value;

/// Issuer every test server and verifier expects.
pub const TEST_ISSUER: &str = "https://example-issuer/pool-1";

/// App client id every test server and verifier expects.
pub const TEST_CLIENT_ID: &str = "client-1";

/// A valid user id for the `sub` claim.
pub const TEST_USER_ID: &str = "6f0c2a4e-8b1d-4c3a-9e7f-2d5b8a1c0e93";

/// Claims as the identity provider would issue them.
///
/// Fields left as `None` are omitted from the payload entirely.
#[derive(Debug, Clone, Serialize)]
pub struct TestClaims {
    pub sub: String,
    pub iss: String,
    pub token_use: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(rename = "cognito:username", skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub identities: Option<Value>,
}

impl TestClaims {
    /// An access token for `sub`, issued now and valid for an hour.
    pub fn access(sub: &str) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: sub.to_string(),
            iss: TEST_ISSUER.to_string(),
            token_use: "access".to_string(),
            aud: None,
            exp: Some(now + 3600),
            iat: Some(now),
            client_id: Some(TEST_CLIENT_ID.to_string()),
            username: Some("test-user".to_string()),
            email: None,
            name: None,
            identities: None,
        }
    }

    /// An ID token for `sub` with `aud` set to the test client id.
    pub fn id(sub: &str) -> Self {
        Self {
            token_use: "id".to_string(),
            aud: Some(Value::String(TEST_CLIENT_ID.to_string())),
            client_id: None,
            email: Some("user@example.com".to_string()),
            ..Self::access(sub)
        }
    }

    pub fn with_issuer(mut self, iss: &str) -> Self {
        self.iss = iss.to_string();
        self
    }

    pub fn with_audience(mut self, aud: Value) -> Self {
        self.aud = Some(aud);
        self
    }

    pub fn without_audience(mut self) -> Self {
        self.aud = None;
        self
    }

    pub fn with_token_use(mut self, token_use: &str) -> Self {
        self.token_use = token_use.to_string();
        self
    }

    pub fn with_exp(mut self, exp: Option<i64>) -> Self {
        self.exp = exp;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_identities(mut self, identities: Value) -> Self {
        self.identities = Some(identities);
        self
    }
}

/// Assemble a compact token from raw JSON parts and raw signature bytes.
///
/// Nothing is signed; use this for tokens a real issuer would never produce.
pub fn forge_token(header: &Value, payload: &Value, signature: &[u8]) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(payload.to_string()),
        URL_SAFE_NO_PAD.encode(signature)
    )
}

/// Flip one bit of the decoded payload and re-encode it, keeping the
/// original header and signature.
///
/// `byte_index` wraps around the payload length.
pub fn flip_payload_bit(token: &str, byte_index: usize, bit: u8) -> String {
    let (header, rest) = token.split_once('.').expect("token should have a header");
    let (payload, signature) = rest.split_once('.').expect("token should have a payload");

    let mut bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .expect("payload should be base64url");
    let index = byte_index % bytes.len();
    bytes[index] ^= 1 << (bit % 8);

    format!(
        "{header}.{}.{signature}",
        URL_SAFE_NO_PAD.encode(bytes)
    )
}

/// Length in bytes of a token's decoded payload.
pub fn payload_len(token: &str) -> usize {
    let payload = token.split('.').nth(1).expect("token should have a payload");
    URL_SAFE_NO_PAD
        .decode(payload)
        .expect("payload should be base64url")
        .len()
}
