//! API service configuration.
//!
//! Configuration is loaded from environment variables. The app client id is
//! redacted in Debug output.

use crate::auth::cache::DEFAULT_CACHE_TTL;
use crate::auth::jwks::{DEFAULT_HTTP_TIMEOUT, JWKS_PATH};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Minimum JWKS cache TTL in seconds.
pub const MIN_JWKS_CACHE_TTL_SECONDS: u64 = 60;

/// Maximum JWKS cache TTL in seconds (1 day).
pub const MAX_JWKS_CACHE_TTL_SECONDS: u64 = 86_400;

/// Maximum JWKS HTTP timeout in seconds.
pub const MAX_JWKS_HTTP_TIMEOUT_SECONDS: u64 = 60;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Parse an `ENVIRONMENT` value.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Some(Environment::Development),
            "production" | "prod" => Some(Environment::Production),
            _ => None,
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

/// API service configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Expected token issuer.
    pub issuer_url: String,

    /// Key-set endpoint (default: issuer + "/.well-known/jwks.json").
    pub jwks_url: String,

    /// App client id; ID tokens must carry it as audience.
    pub client_id: String,

    /// How long a fetched key set is trusted.
    pub jwks_cache_ttl: Duration,

    /// Timeout for each key-set request.
    pub jwks_http_timeout: Duration,

    /// Deployment environment (default: production).
    pub environment: Environment,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("issuer_url", &self.issuer_url)
            .field("jwks_url", &self.jwks_url)
            .field("client_id", &"[REDACTED]")
            .field("jwks_cache_ttl", &self.jwks_cache_ttl)
            .field("jwks_http_timeout", &self.jwks_http_timeout)
            .field("environment", &self.environment)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment: {0}")]
    InvalidEnvironment(String),

    #[error("Invalid JWKS cache TTL configuration: {0}")]
    InvalidCacheTtl(String),

    #[error("Invalid JWKS HTTP timeout configuration: {0}")]
    InvalidHttpTimeout(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let client_id = non_empty(vars, "COGNITO_CLIENT_ID")
            .ok_or_else(|| ConfigError::MissingEnvVar("COGNITO_CLIENT_ID".to_string()))?
            .to_string();

        let issuer_url = match non_empty(vars, "AUTH_ISSUER_URL") {
            Some(issuer) => issuer.trim_end_matches('/').to_string(),
            None => {
                let region = non_empty(vars, "COGNITO_REGION")
                    .ok_or_else(|| ConfigError::MissingEnvVar("COGNITO_REGION".to_string()))?;
                let pool_id = non_empty(vars, "COGNITO_USER_POOL_ID").ok_or_else(|| {
                    ConfigError::MissingEnvVar("COGNITO_USER_POOL_ID".to_string())
                })?;
                cognito_issuer(region, pool_id)
            }
        };

        let jwks_url = non_empty(vars, "AUTH_JWKS_URL")
            .map(ToString::to_string)
            .unwrap_or_else(|| format!("{issuer_url}{JWKS_PATH}"));

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let environment = match vars.get("ENVIRONMENT") {
            Some(value) => Environment::parse(value).ok_or_else(|| {
                ConfigError::InvalidEnvironment(format!(
                    "ENVIRONMENT must be one of development, dev, local, production, prod; got '{}'",
                    value
                ))
            })?,
            None => Environment::Production,
        };

        // Parse JWKS cache TTL with validation
        let jwks_cache_ttl = if let Some(value_str) = vars.get("JWKS_CACHE_TTL_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidCacheTtl(format!(
                    "JWKS_CACHE_TTL_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if !(MIN_JWKS_CACHE_TTL_SECONDS..=MAX_JWKS_CACHE_TTL_SECONDS).contains(&value) {
                return Err(ConfigError::InvalidCacheTtl(format!(
                    "JWKS_CACHE_TTL_SECONDS must be between {} and {}, got {}",
                    MIN_JWKS_CACHE_TTL_SECONDS, MAX_JWKS_CACHE_TTL_SECONDS, value
                )));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_CACHE_TTL
        };

        // Parse JWKS HTTP timeout with validation
        let jwks_http_timeout = if let Some(value_str) = vars.get("JWKS_HTTP_TIMEOUT_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidHttpTimeout(format!(
                    "JWKS_HTTP_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 || value > MAX_JWKS_HTTP_TIMEOUT_SECONDS {
                return Err(ConfigError::InvalidHttpTimeout(format!(
                    "JWKS_HTTP_TIMEOUT_SECONDS must be between 1 and {}, got {}",
                    MAX_JWKS_HTTP_TIMEOUT_SECONDS, value
                )));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_HTTP_TIMEOUT
        };

        Ok(Config {
            bind_address,
            issuer_url,
            jwks_url,
            client_id,
            jwks_cache_ttl,
            jwks_http_timeout,
            environment,
        })
    }
}

fn non_empty<'a>(vars: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Issuer URL of a Cognito user pool.
pub fn cognito_issuer(region: &str, user_pool_id: &str) -> String {
    format!("https://cognito-idp.{region}.amazonaws.com/{user_pool_id}")
}
