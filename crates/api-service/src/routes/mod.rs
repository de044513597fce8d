//! HTTP routes for the API service.
//!
//! Defines the Axum router and application state.

use crate::auth::AuthResolver;
use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Request timeout applied to every route.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Authentication entry point.
    pub resolver: Arc<AuthResolver>,
}

/// Build the application routes.
///
/// - `/health` - Liveness probe (simple "OK") - public
/// - `/ready` - Readiness probe (JWKS endpoint reachability) - public
/// - `/metrics` - Prometheus metrics - public
/// - `/api/v1/me` - Current user - requires authentication
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        resolver: state.resolver.clone(),
    });

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let protected_routes = Router::new()
        .route("/api/v1/me", get(handlers::get_me))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Each .layer() wraps everything added before it:
    // 1. TimeoutLayer (innermost, so timed-out requests are still traced)
    // 2. TraceLayer
    // 3. http_metrics_middleware (outermost, sees every response)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::build_resolver;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::collections::HashMap;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let vars = HashMap::from([
            ("COGNITO_CLIENT_ID".to_string(), "client-1".to_string()),
            (
                "AUTH_ISSUER_URL".to_string(),
                "https://example-issuer/pool-1".to_string(),
            ),
            (
                "AUTH_JWKS_URL".to_string(),
                "http://127.0.0.1:1/.well-known/jwks.json".to_string(),
            ),
        ]);
        let config = Config::from_vars(&vars).unwrap();
        let resolver = Arc::new(build_resolver(&config));
        let state = Arc::new(AppState { config, resolver });

        build_routes(state, PrometheusBuilder::new().build_recorder().handle())
    }

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[tokio::test]
    async fn test_layered_router_serves_public_and_protected_routes() {
        let router = test_router();

        let response = router
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(Request::get("/api/v1/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
