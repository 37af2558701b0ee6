//! Mutual TLS (mTLS) client-certificate identity.
//!
//! The transport layer completes the TLS handshake, verifies the client chain
//! against its CA, and stores the negotiated chain in the request extensions
//! as [`PeerCertificates`]. This strategy only reads identity from the first
//! certificate of that chain.
//!
//! ```text
//! TCP connection
//!   → TLS handshake  (rustls verifies client cert against CA)
//!   → PeerCertificates inserted into request extensions
//!   → MtlsAuthenticator: CN → subject, O / SAN DNS → claims
//! ```

pub mod identity;

use async_trait::async_trait;
use axum::http::request::Parts;
use rustls::pki_types::CertificateDer;
use serde_json::Value;
use tracing::debug;

use crate::authenticator::{AuthError, Authenticator};
use crate::identity::{AuthInfo, AuthMethod, Claims};

pub use identity::CertIdentity;

/// Claim key for the certificate's Organization list.
pub const ORGANIZATIONS_CLAIM: &str = "organizations";
/// Claim key for the certificate's SAN DNS names.
pub const DNS_NAMES_CLAIM: &str = "dns_names";

/// Peer certificate chain negotiated on the request's TLS session.
///
/// Absent from the extensions when the request did not arrive over TLS.
/// Empty when TLS was used but the client presented no certificate.
#[derive(Debug, Clone, Default)]
pub struct PeerCertificates(pub Vec<CertificateDer<'static>>);

impl PeerCertificates {
    /// Capture the chain from a completed server handshake.
    #[must_use]
    pub fn from_connection(conn: &rustls::ServerConnection) -> Self {
        Self(
            conn.peer_certificates()
                .map(|certs| certs.iter().map(|c| c.clone().into_owned()).collect())
                .unwrap_or_default(),
        )
    }
}

/// Authenticates requests by their client certificate.
#[derive(Debug, Clone, Copy, Default)]
pub struct MtlsAuthenticator;

impl MtlsAuthenticator {
    /// Create the authenticator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Authenticator for MtlsAuthenticator {
    async fn authenticate(&self, request: &Parts) -> Result<AuthInfo, AuthError> {
        let Some(PeerCertificates(chain)) = request.extensions.get::<PeerCertificates>() else {
            return Err(AuthError::Unauthenticated);
        };
        let Some(leaf) = chain.first() else {
            return Err(AuthError::InvalidCertificate(
                "no peer certificate presented".to_string(),
            ));
        };

        let identity = CertIdentity::from_der(leaf.as_ref())?;
        debug!(subject = %identity.common_name, "Client certificate accepted");

        let mut claims = Claims::new();
        if !identity.organizations.is_empty() {
            claims.insert(
                ORGANIZATIONS_CLAIM.to_string(),
                Value::from(identity.organizations),
            );
        }
        if !identity.dns_names.is_empty() {
            claims.insert(DNS_NAMES_CLAIM.to_string(), Value::from(identity.dns_names));
        }

        Ok(AuthInfo::with_claims(
            AuthMethod::Mtls,
            identity.common_name,
            claims,
        ))
    }

    fn method(&self) -> AuthMethod {
        AuthMethod::Mtls
    }
}
