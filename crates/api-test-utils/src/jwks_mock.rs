//! wiremock helpers for the key-set endpoint.

use crate::keys::TestKeypair;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the API service fetches keys from, relative to the mock server.
pub const MOCK_JWKS_PATH: &str = "/.well-known/jwks.json";

/// Full key-set URL on `server`.
pub fn jwks_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), MOCK_JWKS_PATH)
}

/// A JWKS document publishing `keys`.
pub fn jwks_document(keys: &[&TestKeypair]) -> Value {
    json!({ "keys": keys.iter().map(|k| k.jwk()).collect::<Vec<_>>() })
}

/// Serve `keys` at [`MOCK_JWKS_PATH`].
pub async fn mount_jwks(server: &MockServer, keys: &[&TestKeypair]) {
    mount_jwks_response(
        server,
        ResponseTemplate::new(200).set_body_json(jwks_document(keys)),
        None,
    )
    .await;
}

/// Serve `keys` and verify on drop that the endpoint was hit exactly
/// `expected_calls` times.
pub async fn mount_jwks_expecting(server: &MockServer, keys: &[&TestKeypair], expected_calls: u64) {
    mount_jwks_response(
        server,
        ResponseTemplate::new(200).set_body_json(jwks_document(keys)),
        Some(expected_calls),
    )
    .await;
}

/// Serve an arbitrary response at [`MOCK_JWKS_PATH`].
pub async fn mount_jwks_response(
    server: &MockServer,
    response: ResponseTemplate,
    expected_calls: Option<u64>,
) {
    let mock = Mock::given(method("GET"))
        .and(path(MOCK_JWKS_PATH))
        .respond_with(response);

    let mock = match expected_calls {
        Some(n) => mock.expect(n),
        None => mock,
    };

    mock.mount(server).await;
}
