//! Selfpomodoro API service library.
//!
//! Bearer-token authentication against the identity provider's published
//! signing keys, and the HTTP host that embeds it.
//!
//! # Modules
//!
//! - `auth` - JWKS fetching, key cache, token verification, identity resolution
//! - `config` - Service configuration
//! - `errors` - HTTP-facing error type
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication and HTTP metrics middleware
//! - `models` - Response bodies
//! - `observability` - Prometheus metrics
//! - `routes` - Router and application state

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
