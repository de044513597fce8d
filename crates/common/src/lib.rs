//! Common utilities shared across the selfpomodoro backend crates.

#![warn(clippy::pedantic)]

/// Module for compact JWT wire-format helpers
pub mod jwt;
