//! Compact JWT wire-format helpers.
//!
//! These functions operate on the raw token text only. They never verify a
//! signature and never interpret claims; callers use them to get from a raw
//! bearer string to the pieces a verifier needs:
//!
//! - Size limit enforcement before any decoding
//! - Splitting into header, payload and signature segments
//! - Header parsing (`alg`, `kid`, `typ`)
//! - Mapping RS/PS algorithm names onto [`jsonwebtoken::Algorithm`]
//! - Unpadded base64url decoding
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing
//! - Only the RSA families (RS256/384/512, PS256/384/512) are mapped; `none`,
//!   HMAC and elliptic-curve names are reported as unsupported
//! - Error messages are generic; details are logged at debug level
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{parse_header, rsa_algorithm, split_token};
//!
//! let segments = split_token(token)?;
//! let header = parse_header(segments.header)?;
//! let algorithm = rsa_algorithm(&header.alg).ok_or(Unsupported)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::Algorithm;
use serde::Serialize;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Provider-issued ID tokens carry profile and identity claims and are larger
/// than bare service tokens, but stay well under 2KB in practice. Anything
/// above this limit is rejected before base64 decoding or signature work.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

// =============================================================================
// Error Types
// =============================================================================

/// Errors produced while taking a compact JWT apart.
///
/// Messages are intentionally generic to prevent information leakage.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JwtFormatError {
    /// Token size exceeds [`MAX_JWT_SIZE_BYTES`].
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token is not three dot-separated segments, or the header is not
    /// base64url-encoded JSON.
    #[error("The access token is invalid or expired")]
    MalformedToken,
}

// =============================================================================
// Types
// =============================================================================

/// The three segments of a compact JWT, borrowed from the raw token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JwtSegments<'a> {
    /// base64url-encoded header JSON.
    pub header: &'a str,

    /// base64url-encoded payload JSON.
    pub payload: &'a str,

    /// base64url-encoded signature bytes (may be empty for unsigned tokens).
    pub signature: &'a str,

    /// `header.payload`, the exact bytes covered by the signature.
    pub signing_input: &'a str,
}

/// The JOSE header fields a verifier cares about.
///
/// `kid` is `None` when the header has no `kid`, when it is empty, or when it
/// is not a JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JwtHeader {
    /// Algorithm name exactly as written in the header.
    pub alg: String,

    /// Key identifier used for key-set lookup.
    pub kid: Option<String>,

    /// Optional media type, typically `JWT`.
    pub typ: Option<String>,
}

// =============================================================================
// Functions
// =============================================================================

/// Split a compact JWT into its segments.
///
/// The size limit is applied first. The token must contain exactly two dots
/// and a non-empty header; payload and signature validity are left to the
/// caller so that the algorithm check can run before anything else fails.
///
/// # Errors
///
/// - `TokenTooLarge` if the token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `MalformedToken` if the token is not three segments
pub fn split_token(token: &str) -> Result<JwtSegments<'_>, JwtFormatError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtFormatError::TokenTooLarge);
    }

    let (signing_input, signature) = token.rsplit_once('.').ok_or_else(|| {
        tracing::debug!(target: "common.jwt", "Token rejected: no segment separator");
        JwtFormatError::MalformedToken
    })?;

    let (header, payload) = signing_input.split_once('.').ok_or_else(|| {
        tracing::debug!(target: "common.jwt", "Token rejected: expected three segments");
        JwtFormatError::MalformedToken
    })?;

    if payload.contains('.') {
        tracing::debug!(target: "common.jwt", "Token rejected: more than three segments");
        return Err(JwtFormatError::MalformedToken);
    }

    if header.is_empty() {
        tracing::debug!(target: "common.jwt", "Token rejected: empty header segment");
        return Err(JwtFormatError::MalformedToken);
    }

    Ok(JwtSegments {
        header,
        payload,
        signature,
        signing_input,
    })
}

/// Decode and parse the header segment.
///
/// A missing or non-string `alg` makes the header malformed. A `kid` that is
/// absent, empty, or not a string is reported as `None` so the caller can
/// decide how to treat it.
///
/// # Errors
///
/// Returns `MalformedToken` if the segment is not base64url JSON object with
/// a string `alg`.
pub fn parse_header(segment: &str) -> Result<JwtHeader, JwtFormatError> {
    let bytes = decode_base64url(segment).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtFormatError::MalformedToken
    })?;

    let header: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtFormatError::MalformedToken
    })?;

    let alg = header
        .get("alg")
        .and_then(serde_json::Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| {
            tracing::debug!(target: "common.jwt", "JWT header has no string alg");
            JwtFormatError::MalformedToken
        })?;

    let kid = header
        .get("kid")
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string);

    let typ = header
        .get("typ")
        .and_then(serde_json::Value::as_str)
        .map(ToString::to_string);

    Ok(JwtHeader { alg, kid, typ })
}

/// Map an algorithm name onto an RSA signature algorithm.
///
/// Returns `None` for anything outside RS256/384/512 and PS256/384/512,
/// including `none`, the HMAC family and elliptic-curve algorithms.
#[must_use]
pub fn rsa_algorithm(alg: &str) -> Option<Algorithm> {
    match alg {
        "RS256" => Some(Algorithm::RS256),
        "RS384" => Some(Algorithm::RS384),
        "RS512" => Some(Algorithm::RS512),
        "PS256" => Some(Algorithm::PS256),
        "PS384" => Some(Algorithm::PS384),
        "PS512" => Some(Algorithm::PS512),
        _ => None,
    }
}

/// Decode an unpadded base64url value (JWT segments, JWK `n` and `e`).
///
/// # Errors
///
/// Returns `base64::DecodeError` if the input is not unpadded base64url.
pub fn decode_base64url(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(value)
}

// =============================================================================
// Tests
// =============================================================================
