//! API service error types.
//!
//! Every authentication failure collapses to one of two client-visible
//! outcomes. Token rejections become a generic 401 with a `WWW-Authenticate`
//! challenge; key-set outages become a 503. The specific reason is logged
//! server-side and never returned to the client.

use crate::auth::AuthError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message returned for every rejected token.
pub const INVALID_TOKEN_MESSAGE: &str = "The access token is invalid or expired";

const WWW_AUTHENTICATE_CHALLENGE: &str =
    "Bearer realm=\"selfpomodoro-api\", error=\"invalid_token\"";

/// API service error type.
///
/// Maps to HTTP status codes:
/// - InvalidToken: 401 Unauthorized
/// - ServiceUnavailable: 503 Service Unavailable
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidToken(_) => 401,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Token(reason) => {
                tracing::debug!(target: "api.errors", code = reason.code(), "Token rejected");
                ApiError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string())
            }
            AuthError::Infrastructure(e) => {
                tracing::error!(target: "api.errors", error = %e, code = e.kind().code(), "Authentication infrastructure failure");
                ApiError::ServiceUnavailable(e.to_string())
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::InvalidToken(_) => (
                StatusCode::UNAUTHORIZED,
                "INVALID_TOKEN",
                INVALID_TOKEN_MESSAGE.to_string(),
            ),
            ApiError::ServiceUnavailable(reason) => {
                // Log actual reason server-side
                tracing::warn!(target: "api.availability", reason = %reason, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable".to_string(),
                )
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(WWW_AUTHENTICATE_CHALLENGE),
            );
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::{InfrastructureError, InfrastructureErrorKind, TokenError};
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::InvalidToken("x".to_string()).status_code(), 401);
        assert_eq!(
            ApiError::ServiceUnavailable("x".to_string()).status_code(),
            503
        );
    }

    #[test]
    fn test_every_token_error_maps_to_generic_401() {
        for reason in [
            TokenError::TokenNotFound,
            TokenError::SignatureInvalid,
            TokenError::TokenExpired,
            TokenError::PublicKeyNotFound,
        ] {
            let err = ApiError::from(AuthError::from(reason));
            assert!(
                matches!(&err, ApiError::InvalidToken(message) if message == INVALID_TOKEN_MESSAGE),
                "{reason:?} should map to the generic 401"
            );
        }
    }

    #[test]
    fn test_infrastructure_error_maps_to_503() {
        let err = ApiError::from(AuthError::from(InfrastructureError::new(
            InfrastructureErrorKind::Timeout,
        )));
        assert_eq!(err.status_code(), 503);
    }

    #[tokio::test]
    async fn test_401_response_has_challenge() {
        let response = ApiError::InvalidToken("detail".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(challenge.starts_with("Bearer"));
        assert!(challenge.contains("invalid_token"));

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "INVALID_TOKEN");
        assert_eq!(body["error"]["message"], INVALID_TOKEN_MESSAGE);
    }

    #[tokio::test]
    async fn test_503_response_hides_detail() {
        let response =
            ApiError::ServiceUnavailable("failed to fetch JWKS: connection refused".to_string())
                .into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());

        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "Service temporarily unavailable");
        assert!(!body.to_string().contains("connection refused"));
    }
}
