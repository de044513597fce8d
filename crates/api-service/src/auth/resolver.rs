//! Authentication resolver.
//!
//! The single entry point request handlers call: takes the raw
//! `Authorization` header value and returns a [`VerifiedIdentity`] or a typed
//! failure.
//!
//! # Development bypass
//!
//! In [`Environment::Development`] the exact header value `Bearer dev-token`
//! resolves to a fixed development identity without touching the verifier.
//! The decision is made once at construction; in production the bypass does
//! not exist and that header is verified like any other token (and fails).

use crate::auth::claims::{Claims, TokenUse, VerifiedIdentity};
use crate::auth::error::{AuthError, InfrastructureError, TokenError};
use crate::auth::jwt::TokenVerifier;
use crate::config::Environment;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Header value that triggers the development bypass.
pub const DEV_BEARER_TOKEN: &str = "Bearer dev-token";

/// User id of the development identity.
pub const DEV_USER_ID: Uuid = Uuid::from_u128(1);

/// Issuer recorded on the development identity.
pub const DEV_ISSUER: &str = "dev-environment";

/// Resolves request credentials into identities.
pub struct AuthResolver {
    verifier: Arc<TokenVerifier>,
    environment: Environment,
    dev_bypass: bool,
}

impl AuthResolver {
    pub fn new(verifier: Arc<TokenVerifier>, environment: Environment) -> Self {
        let dev_bypass = environment.is_development();
        if dev_bypass {
            tracing::warn!(
                target: "api.auth.resolver",
                "Development token bypass is enabled; do not use this configuration in production"
            );
        }

        Self {
            verifier,
            environment,
            dev_bypass,
        }
    }

    pub fn dev_bypass_enabled(&self) -> bool {
        self.dev_bypass
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    /// Authenticate a raw `Authorization` header value.
    ///
    /// # Errors
    ///
    /// - `TokenNotFound` if the header is absent or blank
    /// - Any verifier error, passed through unchanged
    #[instrument(skip_all)]
    pub async fn authenticate(&self, header: Option<&str>) -> Result<VerifiedIdentity, AuthError> {
        let header = header
            .filter(|h| !h.trim().is_empty())
            .ok_or(TokenError::TokenNotFound)?;

        // Exact match only; surrounding whitespace goes to the verifier.
        if self.dev_bypass && header == DEV_BEARER_TOKEN {
            tracing::debug!(target: "api.auth.resolver", "Development token accepted");
            return Ok(development_identity());
        }

        self.verifier.verify(header).await
    }

    /// Check that the key-set endpoint is reachable.
    ///
    /// Always succeeds in development, where the identity provider may not be
    /// configured at all.
    pub async fn health_check(&self) -> Result<(), InfrastructureError> {
        if self.environment.is_development() {
            return Ok(());
        }
        self.verifier.health_check().await
    }
}

/// The fixed identity returned by the development bypass.
pub fn development_identity() -> VerifiedIdentity {
    VerifiedIdentity {
        user_id: DEV_USER_ID,
        claims: Claims {
            sub: DEV_USER_ID.to_string(),
            iss: DEV_ISSUER.to_string(),
            token_use: TokenUse::Access.as_str().to_string(),
            username: Some("dev-user".to_string()),
            email: Some("dev@example.com".to_string()),
            email_verified: Some(true),
            name: Some("Development User".to_string()),
            ..Claims::default()
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::cache::{KeySetCache, DEFAULT_CACHE_TTL};
    use crate::auth::clock::SystemClock;
    use crate::auth::error::InfrastructureErrorKind;
    use crate::auth::jwks::JwksFetcher;
    use crate::auth::jwt::VerifierSettings;
    use crate::auth::keys::KeyRecord;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fetcher whose endpoint is always down.
    #[derive(Default)]
    struct DownFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl JwksFetcher for DownFetcher {
        async fn fetch(&self) -> Result<Vec<KeyRecord>, InfrastructureError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(InfrastructureError::new(InfrastructureErrorKind::JwksFetchFailed))
        }

        async fn health_check(&self) -> Result<(), InfrastructureError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(InfrastructureError::new(InfrastructureErrorKind::JwksFetchFailed))
        }
    }

    fn resolver(environment: Environment) -> (AuthResolver, Arc<DownFetcher>) {
        let fetcher = Arc::new(DownFetcher::default());
        let clock = Arc::new(SystemClock);
        let verifier = TokenVerifier::new(
            VerifierSettings {
                issuer: "https://example-issuer/pool-1".to_string(),
                audience: "client-1".to_string(),
                cache_ttl: DEFAULT_CACHE_TTL,
            },
            Arc::new(KeySetCache::new(clock.clone())),
            fetcher.clone(),
            clock,
        );
        (AuthResolver::new(Arc::new(verifier), environment), fetcher)
    }

    #[tokio::test]
    async fn test_missing_or_blank_header_is_token_not_found() {
        let (resolver, fetcher) = resolver(Environment::Production);

        for header in [None, Some(""), Some("   ")] {
            let err = resolver.authenticate(header).await.unwrap_err();
            assert_eq!(err.token_error(), Some(TokenError::TokenNotFound));
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dev_token_bypasses_verifier_in_development() {
        let (resolver, fetcher) = resolver(Environment::Development);
        assert!(resolver.dev_bypass_enabled());

        let identity = resolver.authenticate(Some(DEV_BEARER_TOKEN)).await.unwrap();

        assert_eq!(identity, development_identity());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dev_token_is_verified_in_production() {
        let (resolver, fetcher) = resolver(Environment::Production);
        assert!(!resolver.dev_bypass_enabled());

        let err = resolver
            .authenticate(Some(DEV_BEARER_TOKEN))
            .await
            .unwrap_err();

        assert_eq!(err.token_error(), Some(TokenError::TokenMalformed));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_only_exact_dev_token_bypasses() {
        let (resolver, _fetcher) = resolver(Environment::Development);

        for header in [
            "Bearer dev-token-2",
            " Bearer dev-token ",
            "Bearer dev-token\t",
            "bearer dev-token",
            "Bearer  dev-token",
        ] {
            let err = resolver.authenticate(Some(header)).await.unwrap_err();
            assert_eq!(
                err.token_error(),
                Some(TokenError::TokenMalformed),
                "{header:?} must not trigger the development bypass"
            );
        }
    }

    #[tokio::test]
    async fn test_health_check_skipped_in_development() {
        let (dev, dev_fetcher) = resolver(Environment::Development);
        assert!(dev.health_check().await.is_ok());
        assert_eq!(dev_fetcher.calls.load(Ordering::SeqCst), 0);

        let (prod, prod_fetcher) = resolver(Environment::Production);
        let err = prod.health_check().await.unwrap_err();
        assert_eq!(err.kind(), InfrastructureErrorKind::JwksFetchFailed);
        assert_eq!(prod_fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dev_user_id() {
        assert_eq!(
            DEV_USER_ID.to_string(),
            "00000000-0000-0000-0000-000000000001"
        );
    }

    #[test]
    fn test_development_identity_shape() {
        let identity = development_identity();

        assert_eq!(identity.user_id, DEV_USER_ID);
        assert!(identity.claims.is_access_token());
        assert_eq!(identity.claims.iss, DEV_ISSUER);
        assert_eq!(identity.claims.email.as_deref(), Some("dev@example.com"));
        assert_eq!(
            identity.claims.display_name().as_deref(),
            Some("Development User")
        );
        assert_eq!(identity.claims.username.as_deref(), Some("dev-user"));
        assert!(!identity.claims.is_federated());
    }
}
