//! Request Authentication Core
//!
//! Pluggable authenticators for inbound HTTP requests, all behind one
//! [`Authenticator`] contract.
//!
//! # Strategies
//!
//! - **mTLS**: identity from the client certificate negotiated by the TLS layer
//! - **Basic**: bcrypt password hashes, with a dummy comparison for unknown users
//! - **API key**: `X-API-Key`, compared in constant time against every key
//! - **OIDC**: JWT bearer tokens verified against a discovered, refreshed JWKS
//! - **Multi**: the above in priority order, falling through only when a
//!   strategy found no credentials
//!
//! # Errors
//!
//! Construction problems are [`Error`] and should stop the application.
//! Request-time failures are [`AuthError`]; [`AuthError::Unauthenticated`]
//! means "no credentials", every other kind means "credentials rejected".

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api_key;
pub mod authenticator;
pub mod basic;
pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod mtls;
pub mod multi;
pub mod oidc;

pub use api_key::ApiKeyAuthenticator;
pub use authenticator::{AuthError, Authenticator};
pub use basic::BasicAuthenticator;
pub use config::AuthConfig;
pub use context::Authenticated;
pub use error::{Error, Result};
pub use identity::{AuthInfo, AuthMethod, Claims};
pub use mtls::{MtlsAuthenticator, PeerCertificates};
pub use multi::MultiAuthenticator;
pub use oidc::{OidcAuthenticator, OidcVerifier, TokenClaims, TokenError, VerifierOptions};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
///
/// `RUST_LOG` overrides `level` when set. Fails if a global subscriber is
/// already installed.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match format {
        Some("json") => subscriber.with(fmt::layer().json()).try_init(),
        _ => subscriber.with(fmt::layer()).try_init(),
    };

    installed.map_err(|e| Error::Config(format!("failed to install tracing subscriber: {e}")))
}
