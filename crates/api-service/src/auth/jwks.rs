//! JWKS fetcher.
//!
//! Fetches the identity provider's `/.well-known/jwks.json` document and
//! decodes it into key records. The fetcher never touches the cache and never
//! retries; the verifier decides when to fetch.
//!
//! # Security
//!
//! - HTTPS should be used in production (enforced by deployment config)
//! - Every request is bounded by the client timeout
//! - Unusable entries are skipped individually

use crate::auth::error::{InfrastructureError, InfrastructureErrorKind};
use crate::auth::keys::KeyRecord;
use crate::observability::metrics;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Default HTTP timeout for key-set requests.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Path of the key-set document relative to the issuer.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Source of key records.
#[async_trait]
pub trait JwksFetcher: Send + Sync {
    /// Fetch and decode the current key set.
    async fn fetch(&self) -> Result<Vec<KeyRecord>, InfrastructureError>;

    /// Check that the key-set endpoint answers, without decoding or caching.
    async fn health_check(&self) -> Result<(), InfrastructureError>;
}

/// Top-level shape of the key-set document. Entries stay untyped so each one
/// can be accepted or skipped on its own.
#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<serde_json::Value>,
}

/// Decode a key-set document.
///
/// # Errors
///
/// Returns `JwksDecodeFailed` if the body is not a JSON object with a `keys`
/// array. Entries that are not valid key records are skipped.
pub fn decode_key_set(body: &[u8]) -> Result<Vec<KeyRecord>, InfrastructureError> {
    let document: JwksDocument = serde_json::from_slice(body).map_err(|e| {
        tracing::error!(target: "api.auth.jwks", error = %e, "Failed to parse JWKS response");
        InfrastructureError::with_source(InfrastructureErrorKind::JwksDecodeFailed, e)
    })?;

    let total = document.keys.len();
    let records: Vec<KeyRecord> = document
        .keys
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<KeyRecord>(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(target: "api.auth.jwks", error = %e, "Skipping malformed JWKS entry");
                None
            }
        })
        .collect();

    tracing::debug!(target: "api.auth.jwks", total = total, decoded = records.len(), "Decoded JWKS document");

    Ok(records)
}

/// [`JwksFetcher`] backed by an HTTP GET.
///
/// Every request and body read runs under `timeout`, independent of any
/// timeout configured on the underlying client.
pub struct HttpJwksFetcher {
    /// URL of the key-set endpoint.
    jwks_url: String,

    /// HTTP client.
    http_client: reqwest::Client,

    /// Deadline for each GET and for reading its body.
    timeout: Duration,
}

impl HttpJwksFetcher {
    /// Create a fetcher for `jwks_url` with the given request timeout.
    pub fn new(jwks_url: impl Into<String>, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "api.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self::with_client(jwks_url, http_client, timeout)
    }

    /// Create a fetcher around an existing client. `timeout` is enforced on
    /// every call even if the client has none.
    pub fn with_client(
        jwks_url: impl Into<String>,
        http_client: reqwest::Client,
        timeout: Duration,
    ) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            http_client,
            timeout,
        }
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn elapsed(&self, stage: &'static str, e: tokio::time::error::Elapsed) -> InfrastructureError {
        tracing::error!(
            target: "api.auth.jwks",
            stage = stage,
            timeout_ms = self.timeout.as_millis() as u64,
            "JWKS request timed out"
        );
        InfrastructureError::with_source(InfrastructureErrorKind::Timeout, e)
    }

    async fn get(&self) -> Result<reqwest::Response, InfrastructureError> {
        let response = tokio::time::timeout(self.timeout, self.http_client.get(&self.jwks_url).send())
            .await
            .map_err(|e| self.elapsed("send", e))?
            .map_err(|e| {
                let kind = if e.is_timeout() {
                    InfrastructureErrorKind::Timeout
                } else {
                    InfrastructureErrorKind::JwksFetchFailed
                };
                tracing::error!(target: "api.auth.jwks", error = %e, kind = kind.code(), "Failed to fetch JWKS");
                InfrastructureError::with_source(kind, e)
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            tracing::error!(target: "api.auth.jwks", status = %status, "JWKS endpoint returned error");
            return Err(InfrastructureError::with_source(
                InfrastructureErrorKind::JwksFetchFailed,
                format!("unexpected status {status}"),
            ));
        }

        Ok(response)
    }

    async fn fetch_records(&self) -> Result<Vec<KeyRecord>, InfrastructureError> {
        let response = self.get().await?;

        let body = tokio::time::timeout(self.timeout, response.bytes())
            .await
            .map_err(|e| self.elapsed("body", e))?
            .map_err(|e| {
                let kind = if e.is_timeout() {
                    InfrastructureErrorKind::Timeout
                } else {
                    InfrastructureErrorKind::JwksFetchFailed
                };
                tracing::error!(target: "api.auth.jwks", error = %e, "Failed to read JWKS response body");
                InfrastructureError::with_source(kind, e)
            })?;

        decode_key_set(&body)
    }
}

#[async_trait]
impl JwksFetcher for HttpJwksFetcher {
    #[instrument(skip_all)]
    async fn fetch(&self) -> Result<Vec<KeyRecord>, InfrastructureError> {
        tracing::debug!(target: "api.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let start = Instant::now();
        let result = self.fetch_records().await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind().code(),
        };
        metrics::record_jwks_fetch(outcome, start.elapsed());

        result
    }

    #[instrument(skip_all)]
    async fn health_check(&self) -> Result<(), InfrastructureError> {
        self.get().await.map(|_| ())
    }
}
