//! Bearer-token authentication.
//!
//! Control flow for a request:
//! resolver → verifier → cache → (on miss) fetcher → converter → cache → verifier.

pub mod cache;
pub mod claims;
pub mod clock;
pub mod error;
pub mod jwks;
pub mod jwt;
pub mod keys;
pub mod resolver;

pub use claims::{Claims, VerifiedIdentity};
pub use error::{AuthError, InfrastructureError, InfrastructureErrorKind, TokenError};
pub use resolver::AuthResolver;

use crate::config::Config;
use cache::KeySetCache;
use clock::{Clock, SystemClock};
use jwks::HttpJwksFetcher;
use jwt::{TokenVerifier, VerifierSettings};
use std::sync::Arc;

/// Wire up the authentication core from configuration.
pub fn build_resolver(config: &Config) -> AuthResolver {
    build_resolver_with_clock(config, Arc::new(SystemClock))
}

/// Same as [`build_resolver`] with an explicit clock.
pub fn build_resolver_with_clock(config: &Config, clock: Arc<dyn Clock>) -> AuthResolver {
    let fetcher = Arc::new(HttpJwksFetcher::new(
        config.jwks_url.clone(),
        config.jwks_http_timeout,
    ));
    let cache = Arc::new(KeySetCache::new(clock.clone()));
    let verifier = TokenVerifier::new(
        VerifierSettings {
            issuer: config.issuer_url.clone(),
            audience: config.client_id.clone(),
            cache_ttl: config.jwks_cache_ttl,
        },
        cache,
        fetcher,
        clock,
    );

    AuthResolver::new(Arc::new(verifier), config.environment)
}
