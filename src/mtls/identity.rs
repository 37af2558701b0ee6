//! Certificate identity extraction.
//!
//! Parses an X.509 DER-encoded certificate and pulls out the fields the mTLS
//! strategy reports: Common Name, Organizations, SAN DNS names.

use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::FromDer;

use crate::authenticator::AuthError;

// ─────────────────────────────────────────────────────────────────────────────
// Certificate identity
// ─────────────────────────────────────────────────────────────────────────────

/// Identity fields read from an already-trusted client certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertIdentity {
    /// Subject Common Name (CN); empty when the subject has none.
    pub common_name: String,

    /// Subject Organization (O) attributes, in order.
    pub organizations: Vec<String>,

    /// Subject Alternative Name DNS entries.
    pub dns_names: Vec<String>,
}

impl CertIdentity {
    /// Parse a DER-encoded certificate and extract its identity fields.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCertificate`] if the bytes are not a
    /// certificate.
    pub fn from_der(der: &[u8]) -> Result<Self, AuthError> {
        let (_, cert) = X509Certificate::from_der(der).map_err(|e| {
            AuthError::InvalidCertificate(format!("failed to parse peer certificate: {e}"))
        })?;

        Ok(Self {
            common_name: extract_cn(&cert).unwrap_or_default(),
            organizations: extract_organizations(&cert),
            dns_names: extract_dns_names(&cert),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Extraction helpers
// ─────────────────────────────────────────────────────────────────────────────

fn extract_cn(cert: &X509Certificate<'_>) -> Option<String> {
    cert.subject()
        .iter_common_name()
        .next()
        .and_then(|attr| attr.as_str().ok())
        .map(str::to_owned)
}

fn extract_organizations(cert: &X509Certificate<'_>) -> Vec<String> {
    cert.subject()
        .iter_organization()
        .filter_map(|attr| attr.as_str().ok())
        .map(str::to_owned)
        .collect()
}

fn extract_dns_names(cert: &X509Certificate<'_>) -> Vec<String> {
    let Ok(Some(san_ext)) = cert.subject_alternative_name() else {
        return Vec::new();
    };
    san_ext
        .value
        .general_names
        .iter()
        .filter_map(|name| match name {
            GeneralName::DNSName(dns) => Some((*dns).to_owned()),
            _ => None,
        })
        .collect()
}
