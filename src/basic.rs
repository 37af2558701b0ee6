//! HTTP Basic authentication against bcrypt password hashes.
//!
//! Unknown usernames are still checked against a dummy hash so that they take
//! as long to reject as a wrong password for a known user. Both paths return
//! the same [`AuthError::InvalidCredentials`].

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::{HeaderMap, header::AUTHORIZATION, request::Parts};
use base64::Engine;
use tracing::{debug, warn};

use crate::authenticator::{AuthError, Authenticator};
use crate::credentials::parse_table;
use crate::identity::{AuthInfo, AuthMethod};
use crate::{Error, Result};

/// Plaintext hashed once at construction for the dummy comparison.
const DUMMY_PASSWORD: &str = "request-authn/timing-equaliser";

/// Basic authenticator over a fixed `username -> bcrypt hash` table.
pub struct BasicAuthenticator {
    users: HashMap<String, String>,
    dummy_hash: String,
}

impl std::fmt::Debug for BasicAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuthenticator")
            .field("users", &self.users.len())
            .finish_non_exhaustive()
    }
}

impl BasicAuthenticator {
    /// Build from a `user:hash,user:hash` string.
    pub fn new(config: &str) -> Result<Self> {
        let users = parse_table(config, "basic auth")?;

        let cost = users
            .values()
            .map(String::as_str)
            .filter_map(bcrypt_cost)
            .max()
            .unwrap_or(bcrypt::DEFAULT_COST);
        let dummy_hash = bcrypt::hash(DUMMY_PASSWORD, cost)
            .map_err(|e| Error::Config(format!("failed to compute dummy password hash: {e}")))?;

        debug!(users = users.len(), cost, "Basic authenticator ready");
        Ok(Self { users, dummy_hash })
    }

    /// Number of configured users.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl Authenticator for BasicAuthenticator {
    async fn authenticate(&self, request: &Parts) -> std::result::Result<AuthInfo, AuthError> {
        let Some((username, password)) = basic_credentials(&request.headers) else {
            return Err(AuthError::Unauthenticated);
        };

        let stored = self.users.get(&username);
        let known = stored.is_some();
        let hash = stored.unwrap_or(&self.dummy_hash).clone();

        // bcrypt is CPU-bound; keep it off the async workers.
        let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await;
        let matched = match verified {
            Ok(Ok(matched)) => matched,
            Ok(Err(e)) => {
                warn!(user = %username, error = %e, "Stored password hash is unusable");
                false
            }
            Err(e) => {
                warn!(error = %e, "Password verification task failed");
                false
            }
        };

        if known && matched {
            debug!(user = %username, "Basic credentials accepted");
            Ok(AuthInfo::new(AuthMethod::Basic, username))
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    fn method(&self) -> AuthMethod {
        AuthMethod::Basic
    }
}

/// Extract `(username, password)` from `Authorization: Basic ...`.
///
/// Anything that is not a decodable Basic header counts as absent.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Cost factor of a `$2b$12$...` style hash.
fn bcrypt_cost(hash: &str) -> Option<u32> {
    hash.split('$').nth(2)?.parse().ok()
}
