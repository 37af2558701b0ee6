//! Shared-secret API keys presented in the `X-API-Key` header.

use async_trait::async_trait;
use axum::http::request::Parts;
use subtle::{Choice, ConstantTimeEq};
use tracing::debug;

use crate::Result;
use crate::authenticator::{AuthError, Authenticator};
use crate::credentials::parse_table;
use crate::identity::{AuthInfo, AuthMethod};

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// API key authenticator over a fixed `key -> service name` table.
pub struct ApiKeyAuthenticator {
    keys: Vec<(String, String)>,
}

impl std::fmt::Debug for ApiKeyAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuthenticator")
            .field("keys", &self.keys.len())
            .finish()
    }
}

impl ApiKeyAuthenticator {
    /// Build from a `key:name,key:name` string.
    pub fn new(config: &str) -> Result<Self> {
        let keys: Vec<(String, String)> = parse_table(config, "api key")?.into_iter().collect();
        debug!(keys = keys.len(), "API key authenticator ready");
        Ok(Self { keys })
    }

    /// Find the owner of `supplied`.
    ///
    /// Every configured key is compared, whatever matched earlier, so the
    /// time taken does not reveal which entry (if any) was hit.
    fn lookup(&self, supplied: &[u8]) -> Option<&str> {
        let mut found = None;
        for (key, name) in &self.keys {
            let eq: Choice = supplied.ct_eq(key.as_bytes());
            if bool::from(eq) && found.is_none() {
                found = Some(name.as_str());
            }
        }
        found
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    async fn authenticate(&self, request: &Parts) -> std::result::Result<AuthInfo, AuthError> {
        let supplied = request
            .headers
            .get(API_KEY_HEADER)
            .map(|v| v.as_bytes())
            .unwrap_or_default();
        if supplied.is_empty() {
            return Err(AuthError::Unauthenticated);
        }

        match self.lookup(supplied) {
            Some(name) => {
                debug!(client = %name, "API key accepted");
                Ok(AuthInfo::new(AuthMethod::ApiKey, name))
            }
            None => Err(AuthError::InvalidApiKey),
        }
    }

    fn method(&self) -> AuthMethod {
        AuthMethod::ApiKey
    }
}
