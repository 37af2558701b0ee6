//! OIDC bearer-token authentication.
//!
//! # Architecture
//!
//! ```text
//! Authorization: Bearer <jwt>
//!   -> OidcAuthenticator   (extract token, audience policy)
//!   -> OidcVerifier        (header, kid lookup, signature, iss, exp)
//!   -> key cache           (discovery -> jwks_uri, periodic + on-miss refresh)
//! ```
//!
//! Every [`TokenError`] reaching the authenticator is reported to callers as
//! [`AuthError::InvalidToken`], with the verifier's error as its source.

pub mod claims;
pub mod jwks;
pub mod verifier;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{HeaderMap, header::AUTHORIZATION, request::Parts};
use thiserror::Error;
use tracing::debug;

use crate::Result;
use crate::authenticator::{AuthError, Authenticator};
use crate::identity::{AuthInfo, AuthMethod};

pub use claims::TokenClaims;
pub use verifier::{OidcVerifier, VerifierOptions};

/// Token verification failures.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Not a three-segment JWT, or a segment does not decode
    #[error("malformed token: {0}")]
    Malformed(String),

    /// `exp` is not in the future
    #[error("token expired")]
    Expired,

    /// `iss` differs from the configured issuer
    #[error("issuer mismatch: expected {expected}, got {actual}")]
    IssuerMismatch {
        /// Configured issuer
        expected: String,
        /// Issuer named by the token
        actual: String,
    },

    /// No cached key has the token's `kid`, even after a refresh
    #[error("signing key not found: {0}")]
    KeyNotFound(String),

    /// `alg` is not RS256, RS384 or RS512
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Signature does not verify with the key named by `kid`
    #[error("invalid signature")]
    SignatureInvalid,

    /// Key set could not be fetched
    #[error("JWKS fetch failed: {0}")]
    JwksFetchFailed(String),

    /// Token does not list the expected audience
    #[error("audience mismatch: expected {0}")]
    AudienceMismatch(String),
}

/// Authenticates `Authorization: Bearer` JWTs.
#[derive(Debug, Clone)]
pub struct OidcAuthenticator {
    verifier: Arc<OidcVerifier>,
    audience: String,
}

impl OidcAuthenticator {
    /// Wrap a verifier. An empty `audience` disables the audience check.
    #[must_use]
    pub fn new(verifier: Arc<OidcVerifier>, audience: impl Into<String>) -> Self {
        Self {
            verifier,
            audience: audience.into(),
        }
    }

    /// Build the verifier for `issuer` and wrap it.
    pub async fn from_issuer(
        issuer: impl Into<String>,
        audience: impl Into<String>,
        options: VerifierOptions,
    ) -> Result<Self> {
        let verifier = OidcVerifier::with_options(issuer, options).await?;
        Ok(Self::new(Arc::new(verifier), audience))
    }

    /// The wrapped verifier.
    #[must_use]
    pub fn verifier(&self) -> &Arc<OidcVerifier> {
        &self.verifier
    }
}

#[async_trait]
impl Authenticator for OidcAuthenticator {
    async fn authenticate(&self, request: &Parts) -> std::result::Result<AuthInfo, AuthError> {
        let Some(token) = bearer_token(&request.headers) else {
            return Err(AuthError::Unauthenticated);
        };

        let claims = self.verifier.verify(token).await?;

        if !self.audience.is_empty() && !claims.has_audience(&self.audience) {
            return Err(TokenError::AudienceMismatch(self.audience.clone()).into());
        }

        debug!(subject = %claims.subject, "Bearer token accepted");
        Ok(AuthInfo::with_claims(
            AuthMethod::Oidc,
            claims.subject,
            claims.claims,
        ))
    }

    fn method(&self) -> AuthMethod {
        AuthMethod::Oidc
    }
}

/// Token from an exact `Bearer <token>` header, if non-empty.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
}
