//! Token verification.
//!
//! Verifies a compact JWT issued by the identity provider and validates its
//! claims. Verification is a strict forward sequence; the first failing step
//! decides the error:
//!
//! 1. Strip the optional `Bearer ` prefix
//! 2. Split, size-check and parse the header; only RS/PS algorithms pass
//! 3. Resolve the key by `kid`, refreshing the key set once on a miss
//! 4. Verify the signature over `header.payload`, then decode the payload
//! 5. Validate issuer, audience (ID tokens only), subject, `token_use`, expiry
//!
//! # Security
//!
//! - The algorithm comes from the header but is restricted to the RSA
//!   families before any key is looked up, so `none`, HMAC and EC tokens are
//!   rejected regardless of their payload
//! - Claims are never read before the signature has been verified
//! - Expiry is inclusive: a token is valid while `now <= exp`

use crate::auth::cache::KeySetCache;
use crate::auth::claims::{numeric_date, Claims, TokenUse, VerifiedIdentity};
use crate::auth::clock::Clock;
use crate::auth::error::{AuthError, InfrastructureError, TokenError};
use crate::auth::jwks::JwksFetcher;
use crate::auth::keys::PublicKey;
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use common::jwt::{
    decode_base64url, parse_header, rsa_algorithm, split_token, JwtFormatError, JwtSegments,
};
use jsonwebtoken::Algorithm;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;
use uuid::Uuid;

/// What a token must match to be accepted.
#[derive(Debug, Clone)]
pub struct VerifierSettings {
    /// Expected `iss` claim.
    pub issuer: String,

    /// App client id; ID tokens must carry it in `aud`.
    pub audience: String,

    /// How long a refreshed key set stays valid.
    pub cache_ttl: Duration,
}

/// Verifies bearer tokens against the provider's published keys.
pub struct TokenVerifier {
    settings: VerifierSettings,
    cache: Arc<KeySetCache>,
    fetcher: Arc<dyn JwksFetcher>,
    clock: Arc<dyn Clock>,
}

impl TokenVerifier {
    pub fn new(
        settings: VerifierSettings,
        cache: Arc<KeySetCache>,
        fetcher: Arc<dyn JwksFetcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings,
            cache,
            fetcher,
            clock,
        }
    }

    pub fn settings(&self) -> &VerifierSettings {
        &self.settings
    }

    pub fn cache(&self) -> &KeySetCache {
        &self.cache
    }

    /// Verify a raw bearer token and return the authenticated identity.
    ///
    /// # Errors
    ///
    /// - `AuthError::Token` when the token is rejected
    /// - `AuthError::Infrastructure` when the key set could not be fetched
    #[instrument(skip_all)]
    pub async fn verify(&self, raw_token: &str) -> Result<VerifiedIdentity, AuthError> {
        let start = Instant::now();
        let result = self.verify_token(raw_token).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.code(),
        };
        metrics::record_token_validation(outcome, start.elapsed());

        if let Err(e) = &result {
            tracing::debug!(target: "api.auth.jwt", error = %e, code = e.code(), "Token verification failed");
        }

        result
    }

    /// Check that the key-set endpoint is reachable.
    pub async fn health_check(&self) -> Result<(), InfrastructureError> {
        self.fetcher.health_check().await
    }

    async fn verify_token(&self, raw_token: &str) -> Result<VerifiedIdentity, AuthError> {
        let token = strip_bearer(raw_token)?;

        let segments = split_token(token).map_err(format_error)?;
        let header = parse_header(segments.header).map_err(format_error)?;

        let algorithm = rsa_algorithm(&header.alg).ok_or_else(|| {
            tracing::debug!(target: "api.auth.jwt", alg = %header.alg, "Token rejected: unsupported algorithm");
            TokenError::UnsupportedAlgorithm
        })?;

        let kid = header.kid.ok_or(TokenError::KeyIdMissing)?;
        let key = self.resolve_key(&kid).await?;

        verify_signature(&segments, &key, algorithm)?;
        let claims = decode_claims(segments.payload)?;

        let user_id = validate_claims(
            &claims,
            &self.settings.issuer,
            &self.settings.audience,
            self.clock.now(),
        )?;

        Ok(VerifiedIdentity { user_id, claims })
    }

    /// Find the key for `kid`, refreshing the key set exactly once on a miss.
    async fn resolve_key(&self, kid: &str) -> Result<Arc<PublicKey>, AuthError> {
        if let Some(key) = self.cache.get_key(kid).await {
            return Ok(key);
        }

        let records = self.fetcher.fetch().await?;
        self.cache.refresh(&records, self.settings.cache_ttl).await;

        match self.cache.get_key(kid).await {
            Some(key) => Ok(key),
            None => {
                tracing::warn!(target: "api.auth.jwt", kid = %kid, "Key not found in JWKS after refresh");
                Err(TokenError::PublicKeyNotFound.into())
            }
        }
    }
}

/// Strip an optional `Bearer ` prefix.
///
/// # Errors
///
/// Returns `TokenNotFound` if nothing remains.
pub fn strip_bearer(raw: &str) -> Result<&str, TokenError> {
    let trimmed = raw.trim();
    let token = if trimmed == "Bearer" {
        ""
    } else {
        trimmed.strip_prefix("Bearer ").unwrap_or(trimmed).trim()
    };

    if token.is_empty() {
        return Err(TokenError::TokenNotFound);
    }

    Ok(token)
}

fn format_error(err: JwtFormatError) -> TokenError {
    match err {
        JwtFormatError::TokenTooLarge | JwtFormatError::MalformedToken => {
            TokenError::TokenMalformed
        }
    }
}

fn verify_signature(
    segments: &JwtSegments<'_>,
    key: &PublicKey,
    algorithm: Algorithm,
) -> Result<(), TokenError> {
    let valid = jsonwebtoken::crypto::verify(
        segments.signature,
        segments.signing_input.as_bytes(),
        key.decoding_key(),
        algorithm,
    )
    .map_err(|e| {
        tracing::debug!(target: "api.auth.jwt", error = %e, "Signature could not be checked");
        TokenError::SignatureInvalid
    })?;

    if !valid {
        tracing::debug!(target: "api.auth.jwt", kid = %key.kid(), "Token rejected: signature mismatch");
        return Err(TokenError::SignatureInvalid);
    }

    Ok(())
}

fn decode_claims(payload: &str) -> Result<Claims, TokenError> {
    let bytes = decode_base64url(payload).map_err(|e| {
        tracing::debug!(target: "api.auth.jwt", error = %e, "Failed to decode JWT payload base64");
        TokenError::TokenMalformed
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "api.auth.jwt", error = %e, "Failed to parse JWT payload JSON");
        TokenError::TokenMalformed
    })
}

/// Validate verified claims against the expected issuer and audience at `now`.
///
/// Checks run in a fixed order: issuer, audience (ID tokens only), subject
/// presence, subject format, `token_use`, expiry. Access tokens carry the
/// client id in `client_id` rather than `aud` and are not audience-checked.
///
/// # Errors
///
/// Returns the `TokenError` of the first failing check.
pub fn validate_claims(
    claims: &Claims,
    expected_issuer: &str,
    expected_audience: &str,
    now: DateTime<Utc>,
) -> Result<Uuid, TokenError> {
    if claims.iss != expected_issuer {
        tracing::debug!(target: "api.auth.jwt", iss = %claims.iss, "Token rejected: issuer mismatch");
        return Err(TokenError::InvalidIssuer);
    }

    if claims.token_use == TokenUse::Id.as_str()
        && !claims
            .aud
            .as_ref()
            .is_some_and(|aud| aud.contains(expected_audience))
    {
        tracing::debug!(target: "api.auth.jwt", "Token rejected: audience mismatch");
        return Err(TokenError::InvalidAudience);
    }

    if claims.sub.is_empty() {
        return Err(TokenError::MissingSubject);
    }

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| TokenError::InvalidSubject)?;

    if claims.token_use_kind().is_none() {
        tracing::debug!(target: "api.auth.jwt", token_use = %claims.token_use, "Token rejected: invalid token_use");
        return Err(TokenError::InvalidTokenUse);
    }

    if let Some(exp) = claims.exp {
        // Out-of-range dates compare on whole seconds; NaN never passes.
        let expired = match numeric_date(exp) {
            Some(expires_at) => now > expires_at,
            None => exp.is_nan() || exp < now.timestamp() as f64,
        };
        if expired {
            tracing::debug!(target: "api.auth.jwt", exp = exp, now = %now, "Token rejected: expired");
            return Err(TokenError::TokenExpired);
        }
    }

    Ok(user_id)
}
