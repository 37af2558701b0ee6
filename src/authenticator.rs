//! The authenticator contract and its error taxonomy.
//!
//! Every strategy tells two situations apart:
//!
//! - **absence** of credentials, reported as [`AuthError::Unauthenticated`];
//! - **invalid** credentials, reported with a strategy-specific kind.
//!
//! [`MultiAuthenticator`](crate::MultiAuthenticator) relies on this: it moves
//! on to the next strategy only on absence.

use async_trait::async_trait;
use axum::http::request::Parts;
use thiserror::Error;

use crate::identity::{AuthInfo, AuthMethod};
use crate::oidc::TokenError;

/// Request-time authentication failures.
#[derive(Error, Debug)]
pub enum AuthError {
    /// No credentials for this strategy were presented
    #[error("unauthenticated")]
    Unauthenticated,

    /// Bearer token failed verification or audience check
    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    /// Client certificate missing from the TLS session or unreadable
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// API key does not match any configured key
    #[error("invalid API key")]
    InvalidApiKey,

    /// Basic credentials rejected (unknown user or wrong password)
    #[error("invalid credentials")]
    InvalidCredentials,
}

impl AuthError {
    /// `true` when the request carried no credentials for the strategy.
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }

    /// Stable snake_case identifier for boundary layers.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidToken(_) => "invalid_token",
            Self::InvalidCertificate(_) => "invalid_certificate",
            Self::InvalidApiKey => "invalid_api_key",
            Self::InvalidCredentials => "invalid_credentials",
        }
    }
}

/// A request authentication strategy.
///
/// Implementations must be safe to share between request tasks and must not
/// keep per-call mutable state.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Establish the identity behind `request`.
    async fn authenticate(&self, request: &Parts) -> Result<AuthInfo, AuthError>;

    /// Constant tag for this strategy.
    fn method(&self) -> AuthMethod;
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn invalid_token_keeps_cause() {
        let err = AuthError::from(TokenError::Expired);
        assert_eq!(err.code(), "invalid_token");
        assert!(err.to_string().contains("expired"));
        assert!(err.source().is_some());
    }

    #[test]
    fn only_unauthenticated_is_absence() {
        assert!(AuthError::Unauthenticated.is_unauthenticated());
        assert!(!AuthError::InvalidApiKey.is_unauthenticated());
        assert!(!AuthError::InvalidCredentials.is_unauthenticated());
        assert!(!AuthError::InvalidCertificate("none".into()).is_unauthenticated());
    }
}
