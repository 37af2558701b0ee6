//! The verified-identity record shared by every strategy.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open-ended claims attached to an identity.
pub type Claims = Map<String, Value>;

/// Which strategy produced an [`AuthInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// No authentication
    None,
    /// Client certificate presented during the TLS handshake
    Mtls,
    /// OIDC bearer token (JWT)
    Oidc,
    /// HTTP Basic with a hashed password
    Basic,
    /// Shared-secret API key
    ApiKey,
    /// Ordered combination of the above
    Multi,
}

impl AuthMethod {
    /// Stable lowercase tag, as used in config and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Mtls => "mtls",
            Self::Oidc => "oidc",
            Self::Basic => "basic",
            Self::ApiKey => "apikey",
            Self::Multi => "multi",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity established for one request.
///
/// Built once per successful authentication and never mutated afterwards.
/// `claims` is only populated by the OIDC and mTLS strategies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthInfo {
    /// Strategy that produced this identity
    pub method: AuthMethod,
    /// Certificate CN, username, API key owner, or token `sub`
    pub subject: String,
    /// Extra claims (token payload, certificate attributes)
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub claims: Claims,
}

impl AuthInfo {
    /// Identity without claims.
    #[must_use]
    pub fn new(method: AuthMethod, subject: impl Into<String>) -> Self {
        Self {
            method,
            subject: subject.into(),
            claims: Claims::new(),
        }
    }

    /// Identity carrying claims.
    #[must_use]
    pub fn with_claims(method: AuthMethod, subject: impl Into<String>, claims: Claims) -> Self {
        Self {
            method,
            subject: subject.into(),
            claims,
        }
    }

    /// Look up a single claim.
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn method_tags_are_lowercase() {
        assert_eq!(AuthMethod::ApiKey.to_string(), "apikey");
        assert_eq!(AuthMethod::Mtls.to_string(), "mtls");
        assert_eq!(serde_json::to_value(AuthMethod::ApiKey).unwrap(), json!("apikey"));
        assert_eq!(
            serde_json::from_value::<AuthMethod>(json!("multi")).unwrap(),
            AuthMethod::Multi
        );
    }

    #[test]
    fn auth_info_omits_empty_claims_when_serialized() {
        let info = AuthInfo::new(AuthMethod::Basic, "alice");
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json, json!({"method": "basic", "subject": "alice"}));
    }

    #[test]
    fn claim_lookup() {
        let mut claims = Claims::new();
        claims.insert("scope".to_string(), json!("read"));
        let info = AuthInfo::with_claims(AuthMethod::Oidc, "sub-1", claims);
        assert_eq!(info.claim("scope"), Some(&json!("read")));
        assert!(info.claim("missing").is_none());
    }
}
