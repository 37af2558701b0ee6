//! Construction-time error types.
//!
//! Request-time failures are [`AuthError`](crate::AuthError); the errors here
//! can only happen while an authenticator is being built, so an application
//! that gets one should refuse to start.

use thiserror::Error;

use crate::oidc::TokenError;

/// Result type alias for authenticator construction
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building an authenticator
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed credential string, empty table, or bad config file
    #[error("Configuration error: {0}")]
    Config(String),

    /// OIDC discovery document missing, unreachable or without `jwks_uri`
    #[error("OIDC discovery failed: {0}")]
    Discovery(String),

    /// Initial key-set fetch failed after all retries
    #[error("Initial JWKS fetch failed: {0}")]
    KeySet(#[source] TokenError),

    /// HTTP client could not be built
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
