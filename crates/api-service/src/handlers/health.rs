//! Health check handlers.
//!
//! - `/health`: Liveness probe - returns OK if the process is running
//! - `/ready`: Readiness probe - checks the identity provider's key-set endpoint

use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Liveness probe handler.
///
/// Does NOT check any dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe handler.
///
/// Issues a GET against the key-set endpoint without touching the key cache.
/// Returns 200 if reachable, 503 otherwise. In development the check is
/// skipped and the service always reports ready.
///
/// ## Security
///
/// Error messages are intentionally generic. Actual errors are logged
/// server-side with `tracing::warn!`.
#[tracing::instrument(skip_all, name = "api.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.resolver.environment().is_development() {
        return (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                jwks: Some("skipped"),
                error: None,
            }),
        );
    }

    match state.resolver.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                jwks: Some("available"),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(target: "api.health", error = %e, "Readiness check failed: JWKS endpoint unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "not_ready",
                    jwks: Some("unavailable"),
                    error: Some("Service dependencies unavailable".to_string()),
                }),
            )
        }
    }
}
