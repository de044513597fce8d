//! Health endpoint integration tests.
//!
//! Tests `/health`, `/ready` and `/metrics` using the `TestApiServer` harness.

use api_service::config::Environment;
use api_test_utils::*;
use wiremock::{MockServer, ResponseTemplate};

/// Test that health endpoint returns 200 regardless of the key-set endpoint.
#[tokio::test]
async fn test_health_endpoint_returns_200() -> Result<(), anyhow::Error> {
    let server = TestApiServer::spawn(
        "http://127.0.0.1:1/.well-known/jwks.json",
        Environment::Production,
    )
    .await?;

    let response = reqwest::get(format!("{}/health", server.url())).await?;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await?, "OK");

    Ok(())
}

/// Test that readiness passes when the key-set endpoint answers.
#[tokio::test]
async fn test_ready_when_jwks_reachable() -> Result<(), anyhow::Error> {
    let jwks = MockServer::start().await;
    mount_jwks(&jwks, &[&TestKeypair::primary("key-1")]).await;
    let server = TestApiServer::spawn(&jwks_url(&jwks), Environment::Production).await?;

    let response = reqwest::get(format!("{}/ready", server.url())).await?;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["jwks"], "available");

    Ok(())
}

/// Test that readiness fails with a generic message when the key-set
/// endpoint errors.
#[tokio::test]
async fn test_not_ready_when_jwks_failing() -> Result<(), anyhow::Error> {
    let jwks = MockServer::start().await;
    mount_jwks_response(&jwks, ResponseTemplate::new(503), None).await;
    let server = TestApiServer::spawn(&jwks_url(&jwks), Environment::Production).await?;

    let response = reqwest::get(format!("{}/ready", server.url())).await?;

    assert_eq!(response.status(), 503);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "not_ready");
    assert_eq!(body["jwks"], "unavailable");
    assert_eq!(body["error"], "Service dependencies unavailable");

    Ok(())
}

/// Test that readiness does not touch the key-set endpoint in development.
#[tokio::test]
async fn test_ready_skips_jwks_in_development() -> Result<(), anyhow::Error> {
    let jwks = MockServer::start().await;
    mount_jwks_expecting(&jwks, &[], 0).await;
    let server = TestApiServer::spawn(&jwks_url(&jwks), Environment::Development).await?;

    let response = reqwest::get(format!("{}/ready", server.url())).await?;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["jwks"], "skipped");

    Ok(())
}

/// Test that the metrics endpoint is public.
#[tokio::test]
async fn test_metrics_endpoint_is_public() -> Result<(), anyhow::Error> {
    let server = TestApiServer::spawn(
        "http://127.0.0.1:1/.well-known/jwks.json",
        Environment::Production,
    )
    .await?;

    let response = reqwest::get(format!("{}/metrics", server.url())).await?;

    assert_eq!(response.status(), 200);

    Ok(())
}

/// Test that non-existent routes return 404.
#[tokio::test]
async fn test_unknown_route_returns_404() -> Result<(), anyhow::Error> {
    let server = TestApiServer::spawn(
        "http://127.0.0.1:1/.well-known/jwks.json",
        Environment::Production,
    )
    .await?;

    let response = reqwest::get(format!("{}/api/v1/nope", server.url())).await?;

    assert_eq!(response.status(), 404);

    Ok(())
}
