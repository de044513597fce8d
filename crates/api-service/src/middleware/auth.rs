//! Authentication middleware for protected routes.
//!
//! Hands the raw `Authorization` header value to the [`AuthResolver`] and
//! injects the resulting [`VerifiedIdentity`] into request extensions.

use crate::auth::{AuthError, AuthResolver, TokenError, VerifiedIdentity};
use crate::errors::ApiError;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub resolver: Arc<AuthResolver>,
}

/// Authentication middleware that resolves bearer tokens.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Response
///
/// - 401 with `WWW-Authenticate` if the token is missing or rejected
/// - 503 if the signing keys cannot be fetched
/// - Otherwise continues with the identity in extensions
#[instrument(skip(state, req, next), name = "api.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let header_value = match req.headers().get(header::AUTHORIZATION) {
        Some(value) => Some(value.to_str().map_err(|_| {
            tracing::debug!(target: "api.middleware.auth", "Authorization header is not valid ASCII");
            ApiError::from(AuthError::from(TokenError::TokenMalformed))
        })?),
        None => None,
    };

    let identity = state.resolver.authenticate(header_value).await?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

/// Extension trait for extracting the identity from a request.
pub trait IdentityExt {
    /// Get the authenticated identity from request extensions.
    ///
    /// Returns `None` if auth middleware was not applied to this request.
    fn identity(&self) -> Option<&VerifiedIdentity>;
}

impl<B> IdentityExt for axum::http::Request<B> {
    fn identity(&self) -> Option<&VerifiedIdentity> {
        self.extensions().get::<VerifiedIdentity>()
    }
}
