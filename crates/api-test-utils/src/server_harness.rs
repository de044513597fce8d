//! Test server harness for E2E testing
//!
//! Provides `TestApiServer` for spawning real API server instances in tests.

use crate::tokens::{TEST_CLIENT_ID, TEST_ISSUER};
use api_service::auth::build_resolver;
use api_service::config::{Config, Environment};
use api_service::routes::{self, AppState};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the API service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health() -> Result<(), anyhow::Error> {
///     let server = TestApiServer::spawn("http://127.0.0.1:1/jwks", Environment::Production).await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestApiServer {
    addr: SocketAddr,
    config: Config,
    _handle: JoinHandle<()>,
}

impl TestApiServer {
    /// Spawn a server that trusts [`TEST_ISSUER`] / [`TEST_CLIENT_ID`] and
    /// fetches keys from `jwks_url`.
    ///
    /// The server binds to a random available port (127.0.0.1:0) and runs
    /// in the background until the harness is dropped.
    pub async fn spawn(jwks_url: &str, environment: Environment) -> Result<Self, anyhow::Error> {
        let vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("COGNITO_CLIENT_ID".to_string(), TEST_CLIENT_ID.to_string()),
            ("AUTH_ISSUER_URL".to_string(), TEST_ISSUER.to_string()),
            ("AUTH_JWKS_URL".to_string(), jwks_url.to_string()),
            ("JWKS_HTTP_TIMEOUT_SECONDS".to_string(), "2".to_string()),
            (
                "ENVIRONMENT".to_string(),
                environment.as_str().to_string(),
            ),
        ]);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let resolver = Arc::new(build_resolver(&config));
        let state = Arc::new(AppState {
            config: config.clone(),
            resolver,
        });

        // A private recorder per server; the global recorder can only be
        // installed once per process.
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for TestApiServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_spawns_successfully() -> Result<(), anyhow::Error> {
        let server =
            TestApiServer::spawn("http://127.0.0.1:1/.well-known/jwks.json", Environment::Production)
                .await?;

        assert!(server.url().starts_with("http://127.0.0.1:"));
        assert!(server.addr().ip().is_loopback());
        assert_eq!(server.config().issuer_url, TEST_ISSUER);

        let response = reqwest::get(format!("{}/health", server.url())).await?;
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await?, "OK");

        Ok(())
    }
}
