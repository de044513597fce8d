//! Error taxonomy for the authentication core.
//!
//! Failures fall into two tiers:
//!
//! - [`TokenError`]: the caller's credential was rejected. Never retryable.
//! - [`InfrastructureError`]: the key set could not be obtained. The same
//!   request may succeed later.
//!
//! [`AuthError`] carries exactly one of the two, so callers decide between
//! "reject the request" and "try again later" with a single match.

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Boxed cause attached to an infrastructure failure.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Reasons a bearer token is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum TokenError {
    #[error("bearer token not found")]
    TokenNotFound,

    #[error("token is malformed")]
    TokenMalformed,

    #[error("token signing algorithm is not supported")]
    UnsupportedAlgorithm,

    #[error("token header has no key id")]
    KeyIdMissing,

    #[error("no published key matches the token key id")]
    PublicKeyNotFound,

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token issuer is invalid")]
    InvalidIssuer,

    #[error("token audience is invalid")]
    InvalidAudience,

    #[error("token subject is missing")]
    MissingSubject,

    #[error("token subject is not a valid user id")]
    InvalidSubject,

    #[error("token_use claim is invalid")]
    InvalidTokenUse,

    #[error("token has expired")]
    TokenExpired,
}

impl TokenError {
    /// Stable snake_case label used in logs and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::TokenNotFound => "token_not_found",
            TokenError::TokenMalformed => "token_malformed",
            TokenError::UnsupportedAlgorithm => "unsupported_algorithm",
            TokenError::KeyIdMissing => "key_id_missing",
            TokenError::PublicKeyNotFound => "public_key_not_found",
            TokenError::SignatureInvalid => "signature_invalid",
            TokenError::InvalidIssuer => "invalid_issuer",
            TokenError::InvalidAudience => "invalid_audience",
            TokenError::MissingSubject => "missing_subject",
            TokenError::InvalidSubject => "invalid_subject",
            TokenError::InvalidTokenUse => "invalid_token_use",
            TokenError::TokenExpired => "token_expired",
        }
    }
}

/// What went wrong while obtaining the key set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfrastructureErrorKind {
    /// Transport failure or non-200 response from the key-set endpoint.
    JwksFetchFailed,

    /// The key-set document is not shaped `{ "keys": [...] }`.
    JwksDecodeFailed,

    /// The key-set request did not complete within the client timeout.
    Timeout,
}

impl InfrastructureErrorKind {
    /// Stable snake_case label used in logs and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            InfrastructureErrorKind::JwksFetchFailed => "jwks_fetch_failed",
            InfrastructureErrorKind::JwksDecodeFailed => "jwks_decode_failed",
            InfrastructureErrorKind::Timeout => "timeout",
        }
    }
}

impl fmt::Display for InfrastructureErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            InfrastructureErrorKind::JwksFetchFailed => "failed to fetch JWKS",
            InfrastructureErrorKind::JwksDecodeFailed => "failed to decode JWKS",
            InfrastructureErrorKind::Timeout => "JWKS request timed out",
        };
        f.write_str(message)
    }
}

/// The key set could not be obtained.
#[derive(Debug)]
pub struct InfrastructureError {
    kind: InfrastructureErrorKind,
    source: Option<BoxError>,
}

impl InfrastructureError {
    pub fn new(kind: InfrastructureErrorKind) -> Self {
        Self { kind, source: None }
    }

    pub fn with_source(kind: InfrastructureErrorKind, source: impl Into<BoxError>) -> Self {
        Self {
            kind,
            source: Some(source.into()),
        }
    }

    pub fn kind(&self) -> InfrastructureErrorKind {
        self.kind
    }
}

impl fmt::Display for InfrastructureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.kind, source),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl StdError for InfrastructureError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn StdError + 'static))
    }
}

/// Outcome of a failed authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),
}

impl AuthError {
    /// Whether the same request may succeed if retried later.
    ///
    /// Only infrastructure failures are retryable; a rejected token stays
    /// rejected.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Infrastructure(_))
    }

    /// The token-tier reason, if this is a token rejection.
    pub fn token_error(&self) -> Option<TokenError> {
        match self {
            AuthError::Token(e) => Some(*e),
            AuthError::Infrastructure(_) => None,
        }
    }

    /// Stable snake_case label used in logs and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Token(e) => e.code(),
            AuthError::Infrastructure(e) => e.kind().code(),
        }
    }
}
