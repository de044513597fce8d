//! Identity token claims.
//!
//! Claims are decoded fresh for every verification and handed to the caller
//! inside a [`VerifiedIdentity`]; nothing here is cached.
//!
//! # Security
//!
//! The `sub` and `email` fields are redacted in Debug output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// Provider name reported for accounts created directly in the user pool.
pub const USER_POOL_PROVIDER: &str = "Cognito_UserPool";

/// Kind of token, from the `token_use` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    Access,
    Id,
}

impl TokenUse {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "access" => Some(TokenUse::Access),
            "id" => Some(TokenUse::Id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenUse::Access => "access",
            TokenUse::Id => "id",
        }
    }
}

/// The `aud` claim, either a single audience or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::Single(value) => value == audience,
            Audience::Multiple(values) => values.iter().any(|v| v == audience),
        }
    }
}

/// A federated provider linked to the account (`identities` claim).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedIdentity {
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub provider_name: Option<String>,

    #[serde(default)]
    pub provider_type: Option<String>,
}

/// Claims carried by provider-issued access and ID tokens.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID) - redacted in Debug output.
    #[serde(default)]
    pub sub: String,

    /// Issuer URL.
    #[serde(default)]
    pub iss: String,

    /// Audience. ID tokens carry the app client id here. Shapes other than a
    /// string or a list of strings decode as `None`.
    #[serde(
        default,
        deserialize_with = "lenient_audience",
        skip_serializing_if = "Option::is_none"
    )]
    pub aud: Option<Audience>,

    /// "access" or "id".
    #[serde(default)]
    pub token_use: String,

    /// Expiration time (NumericDate: Unix epoch seconds, may be fractional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<f64>,

    /// Issued-at time (NumericDate).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<f64>,

    /// App client id. Access tokens carry this instead of `aud`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(
        default,
        rename = "cognito:username",
        skip_serializing_if = "Option::is_none"
    )]
    pub username: Option<String>,

    /// Email address - redacted in Debug output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub email_verified: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    /// Linked federated providers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identities: Vec<LinkedIdentity>,
}

/// Accept `true`/`false` as booleans or strings; federated sign-ins may send
/// the string form.
fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    Ok(
        match Option::<BoolOrString>::deserialize(deserializer)? {
            Some(BoolOrString::Bool(b)) => Some(b),
            Some(BoolOrString::String(s)) => s.parse().ok(),
            None => None,
        },
    )
}

/// Accept a single audience or a list; anything else (numbers, objects,
/// lists containing non-strings) is treated as no audience.
fn lenient_audience<'de, D>(deserializer: D) -> Result<Option<Audience>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        match Option::<serde_json::Value>::deserialize(deserializer)? {
            Some(serde_json::Value::String(s)) => Some(Audience::Single(s)),
            Some(serde_json::Value::Array(values)) => values
                .into_iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => Some(s),
                    _ => None,
                })
                .collect::<Option<Vec<String>>>()
                .map(Audience::Multiple),
            Some(other) => {
                tracing::debug!(target: "api.auth.jwt", kind = json_kind(&other), "Ignoring aud claim of unexpected shape");
                None
            }
            None => None,
        },
    )
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Convert a NumericDate to a timestamp, keeping sub-second precision.
///
/// Returns `None` for non-finite values and values outside chrono's range.
pub fn numeric_date(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }

    let whole = seconds.floor();
    if whole < i64::MIN as f64 || whole >= i64::MAX as f64 {
        return None;
    }

    let nanos = ((seconds - whole) * 1_000_000_000.0).round().clamp(0.0, 999_999_999.0);
    DateTime::from_timestamp(whole as i64, nanos as u32)
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("token_use", &self.token_use)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("client_id", &self.client_id)
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("identities", &self.identities.len())
            .finish_non_exhaustive()
    }
}

impl Claims {
    pub fn token_use_kind(&self) -> Option<TokenUse> {
        TokenUse::parse(&self.token_use)
    }

    pub fn is_access_token(&self) -> bool {
        self.token_use_kind() == Some(TokenUse::Access)
    }

    pub fn is_id_token(&self) -> bool {
        self.token_use_kind() == Some(TokenUse::Id)
    }

    /// Whether the account signed in through a federated provider.
    pub fn is_federated(&self) -> bool {
        !self.identities.is_empty()
    }

    /// Name of the provider the account signed in with.
    pub fn provider_name(&self) -> &str {
        self.identities
            .first()
            .and_then(|identity| identity.provider_name.as_deref())
            .unwrap_or(USER_POOL_PROVIDER)
    }

    /// Best available human-readable name.
    ///
    /// Prefers `name`, then `given_name family_name`, then the user-pool
    /// username, then the email address.
    pub fn display_name(&self) -> Option<String> {
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return Some(name.to_string());
        }

        let parts: Vec<&str> = [self.given_name.as_deref(), self.family_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|p| !p.is_empty())
            .collect();
        if !parts.is_empty() {
            return Some(parts.join(" "));
        }

        self.username
            .as_deref()
            .filter(|u| !u.is_empty())
            .or_else(|| self.email.as_deref().filter(|e| !e.is_empty()))
            .map(ToString::to_string)
    }
}

/// A successfully authenticated caller.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedIdentity {
    pub user_id: Uuid,
    pub claims: Claims,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_provider_claims() {
        let claims: Claims = serde_json::from_value(json!({
            "sub": "2f1b9c1e-9a3d-4a55-8c1f-0a1b2c3d4e5f",
            "iss": "https://cognito-idp.ap-northeast-1.amazonaws.com/pool",
            "aud": "client-1",
            "token_use": "id",
            "exp": 1_700_003_600,
            "iat": 1_700_000_000,
            "cognito:username": "google_1234",
            "email": "user@example.com",
            "email_verified": "true",
            "identities": [
                { "userId": "1234", "providerName": "Google", "providerType": "Google" }
            ]
        }))
        .unwrap();

        assert!(claims.is_id_token());
        assert_eq!(claims.username.as_deref(), Some("google_1234"));
        assert_eq!(claims.email_verified, Some(true));
        assert!(claims.is_federated());
        assert_eq!(claims.provider_name(), "Google");
        assert_eq!(claims.aud, Some(Audience::Single("client-1".to_string())));
    }

    #[test]
    fn test_audience_array() {
        let claims: Claims =
            serde_json::from_value(json!({ "aud": ["other", "client-1"] })).unwrap();

        let aud = claims.aud.unwrap();
        assert!(aud.contains("client-1"));
        assert!(!aud.contains("client-2"));
    }

    #[test]
    fn test_unexpected_audience_shapes_decode_as_none() {
        for aud in [json!(42), json!({ "client": "client-1" }), json!(["client-1", 7]), json!(true)] {
            let claims: Claims = serde_json::from_value(json!({ "aud": aud })).unwrap();
            assert!(claims.aud.is_none(), "aud {aud} should decode as None");
        }
    }

    #[test]
    fn test_fractional_numeric_dates() {
        let claims: Claims =
            serde_json::from_value(json!({ "exp": 4_102_444_800.5, "iat": 4_102_441_200_i64 }))
                .unwrap();

        assert_eq!(claims.exp, Some(4_102_444_800.5));
        assert_eq!(claims.iat, Some(4_102_441_200.0));

        let expires_at = numeric_date(claims.exp.unwrap()).unwrap();
        assert_eq!(expires_at.timestamp(), 4_102_444_800);
        assert_eq!(expires_at.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_numeric_date_out_of_range() {
        assert!(numeric_date(f64::NAN).is_none());
        assert!(numeric_date(f64::INFINITY).is_none());
        assert!(numeric_date(1e300).is_none());
        assert!(numeric_date(-1e300).is_none());
        assert_eq!(numeric_date(0.0).unwrap().timestamp(), 0);
    }

    #[test]
    fn test_missing_fields_default() {
        let claims: Claims = serde_json::from_value(json!({})).unwrap();

        assert!(claims.sub.is_empty());
        assert!(claims.aud.is_none());
        assert!(claims.exp.is_none());
        assert_eq!(claims.token_use_kind(), None);
        assert!(!claims.is_federated());
        assert_eq!(claims.provider_name(), USER_POOL_PROVIDER);
    }

    #[test]
    fn test_display_name_priority() {
        let mut claims = Claims {
            email: Some("user@example.com".to_string()),
            ..Claims::default()
        };
        assert_eq!(claims.display_name().as_deref(), Some("user@example.com"));

        claims.username = Some("user-1".to_string());
        assert_eq!(claims.display_name().as_deref(), Some("user-1"));

        claims.given_name = Some("Ada".to_string());
        assert_eq!(claims.display_name().as_deref(), Some("Ada"));

        claims.family_name = Some("Lovelace".to_string());
        assert_eq!(claims.display_name().as_deref(), Some("Ada Lovelace"));

        claims.name = Some("Countess".to_string());
        assert_eq!(claims.display_name().as_deref(), Some("Countess"));
    }

    #[test]
    fn test_display_name_none() {
        assert_eq!(Claims::default().display_name(), None);
    }

    #[test]
    fn test_debug_redacts_sub_and_email() {
        let claims = Claims {
            sub: "2f1b9c1e-9a3d-4a55-8c1f-0a1b2c3d4e5f".to_string(),
            email: Some("user@example.com".to_string()),
            token_use: "access".to_string(),
            ..Claims::default()
        };

        let debug = format!("{claims:?}");

        assert!(!debug.contains("2f1b9c1e"), "Debug output should not contain sub");
        assert!(!debug.contains("user@example.com"), "Debug output should not contain email");
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("access"));
    }

    #[test]
    fn test_token_use_round_trip() {
        assert_eq!(TokenUse::parse("access"), Some(TokenUse::Access));
        assert_eq!(TokenUse::parse("id"), Some(TokenUse::Id));
        assert_eq!(TokenUse::parse("refresh"), None);
        assert_eq!(TokenUse::Access.as_str(), "access");
    }
}
