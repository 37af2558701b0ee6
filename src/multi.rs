//! Ordered multi-strategy authentication.
//!
//! Strategies are tried in order. A strategy that finds no credentials of its
//! kind passes the request on to the next one. A strategy that finds
//! credentials and rejects them ends the attempt: falling through to a weaker
//! strategy would let a client probe which strategies are configured.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::request::Parts;
use tracing::debug;

use crate::authenticator::{AuthError, Authenticator};
use crate::identity::{AuthInfo, AuthMethod};

/// Tries a list of authenticators in priority order.
#[derive(Clone, Default)]
pub struct MultiAuthenticator {
    authenticators: Vec<Arc<dyn Authenticator>>,
}

impl std::fmt::Debug for MultiAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let methods: Vec<AuthMethod> = self.authenticators.iter().map(|a| a.method()).collect();
        f.debug_struct("MultiAuthenticator")
            .field("methods", &methods)
            .finish()
    }
}

impl MultiAuthenticator {
    /// Compose `authenticators`; earlier entries take priority.
    #[must_use]
    pub fn new(authenticators: Vec<Arc<dyn Authenticator>>) -> Self {
        Self { authenticators }
    }

    /// Methods of the members, in order.
    #[must_use]
    pub fn methods(&self) -> Vec<AuthMethod> {
        self.authenticators.iter().map(|a| a.method()).collect()
    }
}

#[async_trait]
impl Authenticator for MultiAuthenticator {
    async fn authenticate(&self, request: &Parts) -> Result<AuthInfo, AuthError> {
        for authenticator in &self.authenticators {
            match authenticator.authenticate(request).await {
                Ok(info) => return Ok(info),
                Err(AuthError::Unauthenticated) => {
                    debug!(method = %authenticator.method(), "No credentials, trying next method");
                }
                Err(e) => return Err(e),
            }
        }
        Err(AuthError::Unauthenticated)
    }

    fn method(&self) -> AuthMethod {
        AuthMethod::Multi
    }
}
