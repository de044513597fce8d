//! Metrics definitions for the API service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `api_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: 5 values (known paths plus `/other`)
//! - `status`: 3 values (success, error, timeout)
//! - `outcome`: `success` plus the bounded error codes of the auth core
//! - `result`: `hit` or `miss`
//!
//! Key ids and user ids are never used as labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded. Metrics recorded without
/// a recorder go to a no-op sink.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // HTTP request buckets
        .set_buckets_for_metric(
            Matcher::Prefix("api_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Token validation is CPU-bound on a warm cache, network-bound on a miss
        .set_buckets_for_metric(
            Matcher::Prefix("api_token_validation".to_string()),
            &[
                0.0005, 0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set token validation buckets: {e}"))?
        // JWKS fetch buckets, up to the 10s client timeout
        .set_buckets_for_metric(
            Matcher::Prefix("api_jwks_fetch".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set JWKS fetch buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `api_http_requests_total`, `api_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("api_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("api_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        "/api/v1/me" => "/api/v1/me",
        _ => "/other",
    }
}

// ============================================================================
// Authentication Metrics
// ============================================================================

/// Record a token verification outcome
///
/// Metric: `api_token_validations_total`, `api_token_validation_duration_seconds`
/// Labels: `outcome` (`success` or an auth error code)
pub fn record_token_validation(outcome: &str, duration: Duration) {
    histogram!("api_token_validation_duration_seconds",
        "outcome" => outcome.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("api_token_validations_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a JWKS fetch
///
/// Metric: `api_jwks_fetches_total`, `api_jwks_fetch_duration_seconds`
/// Labels: `outcome` (`success`, `jwks_fetch_failed`, `jwks_decode_failed`, `timeout`)
pub fn record_jwks_fetch(outcome: &str, duration: Duration) {
    histogram!("api_jwks_fetch_duration_seconds",
        "outcome" => outcome.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("api_jwks_fetches_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a key set cache lookup
///
/// Metric: `api_jwks_cache_lookups_total`
/// Labels: `result` (`hit` or `miss`)
pub fn record_jwks_cache_lookup(result: &'static str) {
    counter!("api_jwks_cache_lookups_total", "result" => result).increment(1);
}

/// Set the number of keys held by the cache after a refresh
///
/// Metric: `api_jwks_cached_keys`
#[allow(clippy::cast_precision_loss)]
pub fn set_jwks_cached_keys(count: usize) {
    gauge!("api_jwks_cached_keys").set(count as f64);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // These tests execute the recording functions against the global no-op
    // recorder; they do not inspect values.

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/health", 200, Duration::from_millis(5));
        record_http_request("GET", "/api/v1/me", 200, Duration::from_millis(50));
        record_http_request("GET", "/api/v1/me", 401, Duration::from_millis(10));
        record_http_request("GET", "/ready", 503, Duration::from_millis(10));
        record_http_request("GET", "/api/v1/me", 504, Duration::from_secs(30));
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(204), "success");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(504), "timeout");
        assert_eq!(categorize_status_code(401), "error");
        assert_eq!(categorize_status_code(503), "error");
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(normalize_endpoint("/ready"), "/ready");
        assert_eq!(normalize_endpoint("/metrics"), "/metrics");
        assert_eq!(normalize_endpoint("/api/v1/me"), "/api/v1/me");
        assert_eq!(normalize_endpoint("/api/v1/tasks/123"), "/other");
        assert_eq!(normalize_endpoint("/"), "/other");
    }

    #[test]
    fn test_record_auth_metrics() {
        record_token_validation("success", Duration::from_micros(400));
        record_token_validation("token_expired", Duration::from_micros(300));
        record_jwks_fetch("success", Duration::from_millis(80));
        record_jwks_fetch("timeout", Duration::from_secs(10));
        record_jwks_cache_lookup("hit");
        record_jwks_cache_lookup("miss");
        set_jwks_cached_keys(2);
    }
}
