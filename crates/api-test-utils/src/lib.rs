//! # API Test Utilities
//!
//! Shared test utilities for the API service.
//!
//! This crate provides:
//! - Deterministic RSA keypairs that publish as JWKs and sign tokens
//! - Claim builders and helpers for forging and tampering with tokens
//! - wiremock helpers serving a JWKS document
//! - Server test harness (`TestApiServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use api_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let keypair = TestKeypair::primary("key-1");
//!     let jwks = MockServer::start().await;
//!     mount_jwks(&jwks, &[&keypair]).await;
//!
//!     let server = TestApiServer::spawn(&jwks_url(&jwks), Environment::Production).await?;
//!     let token = keypair.sign(&TestClaims::access(TEST_USER_ID));
//!     // GET {server.url()}/api/v1/me with "Authorization: Bearer {token}"
//!     Ok(())
//! }
//! ```

pub mod jwks_mock;
pub mod keys;
pub mod server_harness;
pub mod tokens;

// Re-export commonly used items
pub use jwks_mock::*;
pub use keys::*;
pub use server_harness::*;
pub use tokens::*;
