//! OIDC token verification against a rotating JSON Web Key Set.
//!
//! # Verification flow
//!
//! 1. Split the JWT into its three segments and decode the header.
//! 2. Accept only `RS256`, `RS384` and `RS512`.
//! 3. Look the `kid` up in the key cache; on a miss, refresh the key set once
//!    (with retry) and look again.
//! 4. Verify the RSA-PKCS1v15 signature over `header.payload`.
//! 5. Check `iss` against the configured issuer and `exp` against now.
//!
//! Audience is returned to the caller and not checked here.
//!
//! # Key cache
//!
//! The cache always holds the result of the last successful fetch. Refreshes
//! build a new map without holding the lock and swap it in whole, so readers
//! never see a half-updated set, and a failed refresh leaves the old keys in
//! place. A background task refreshes on a fixed interval until
//! [`OidcVerifier::stop`] is called or the verifier is dropped.

use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind};
use parking_lot::RwLock;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::TokenError;
use super::claims::TokenClaims;
use super::jwks::{KeyMap, discover_jwks_uri, fetch_key_set};
use crate::identity::Claims;
use crate::{Error, Result};

/// Tuning knobs for key-set fetching.
#[derive(Debug, Clone)]
pub struct VerifierOptions {
    /// Interval between background refreshes
    pub refresh_interval: Duration,
    /// Fetch attempts for the initial and on-miss refreshes (at least 1)
    pub retry_attempts: u32,
    /// Delay before the first retry; doubles on each further retry
    pub retry_base_delay: Duration,
    /// Per-request HTTP timeout
    pub http_timeout: Duration,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(15 * 60),
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
            http_timeout: Duration::from_secs(10),
        }
    }
}

/// State shared between the verifier and its refresh task.
struct KeySet {
    issuer: String,
    jwks_uri: String,
    http: reqwest::Client,
    keys: RwLock<KeyMap>,
    retry_attempts: u32,
    retry_base_delay: Duration,
}

impl KeySet {
    fn key(&self, kid: &str) -> Option<DecodingKey> {
        self.keys.read().get(kid).cloned()
    }

    /// Fetch once and swap the new map in.
    async fn refresh(&self) -> std::result::Result<usize, TokenError> {
        let keys = fetch_key_set(&self.http, &self.jwks_uri).await?;
        let count = keys.len();
        *self.keys.write() = keys;
        debug!(jwks_uri = %self.jwks_uri, keys = count, "Key set refreshed");
        Ok(count)
    }

    /// [`refresh`](Self::refresh) with exponential backoff.
    async fn refresh_with_retry(&self) -> std::result::Result<usize, TokenError> {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.retry_base_delay)
            .with_factor(2.0)
            .with_max_times(self.retry_attempts.saturating_sub(1) as usize);

        (|| self.refresh())
            .retry(backoff)
            .notify(|err: &TokenError, delay: Duration| {
                warn!(
                    jwks_uri = %self.jwks_uri,
                    error = %err,
                    delay_ms = delay.as_millis(),
                    "Key set fetch failed, retrying after backoff"
                );
            })
            .await
    }
}

/// Verifies RS256/384/512 JWTs issued by one OIDC provider.
pub struct OidcVerifier {
    key_set: Arc<KeySet>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for OidcVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcVerifier")
            .field("issuer", &self.key_set.issuer)
            .field("jwks_uri", &self.key_set.jwks_uri)
            .finish_non_exhaustive()
    }
}

impl OidcVerifier {
    /// Discover the issuer's key set with default options.
    pub async fn new(issuer: impl Into<String>) -> Result<Self> {
        Self::with_options(issuer, VerifierOptions::default()).await
    }

    /// Discover the issuer's key set, load it, and start background refresh.
    ///
    /// Fails if discovery fails or the initial key-set fetch exhausts its
    /// retries. Must be called within a Tokio runtime.
    pub async fn with_options(issuer: impl Into<String>, options: VerifierOptions) -> Result<Self> {
        let issuer = issuer.into();
        if issuer.is_empty() {
            return Err(Error::Config("OIDC issuer URL is empty".to_string()));
        }
        if options.refresh_interval.is_zero() {
            return Err(Error::Config(
                "OIDC key-set refresh interval must be non-zero".to_string(),
            ));
        }
        if !issuer.starts_with("https://") {
            warn!(issuer = %issuer, "OIDC issuer is not HTTPS");
        }

        let http = reqwest::Client::builder()
            .timeout(options.http_timeout)
            .build()?;
        let jwks_uri = discover_jwks_uri(&http, &issuer).await?;

        let key_set = Arc::new(KeySet {
            issuer,
            jwks_uri,
            http,
            keys: RwLock::new(KeyMap::new()),
            retry_attempts: options.retry_attempts.max(1),
            retry_base_delay: options.retry_base_delay,
        });
        let count = key_set.refresh_with_retry().await.map_err(Error::KeySet)?;
        if count == 0 {
            warn!(jwks_uri = %key_set.jwks_uri, "Key set has no usable RSA signing keys");
        }
        info!(
            issuer = %key_set.issuer,
            jwks_uri = %key_set.jwks_uri,
            keys = count,
            "OIDC verifier ready"
        );

        let shutdown = CancellationToken::new();
        spawn_refresh(
            Arc::clone(&key_set),
            options.refresh_interval,
            shutdown.clone(),
        );

        Ok(Self { key_set, shutdown })
    }

    /// Issuer this verifier accepts tokens from.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.key_set.issuer
    }

    /// Key-set URI resolved through discovery.
    #[must_use]
    pub fn jwks_uri(&self) -> &str {
        &self.key_set.jwks_uri
    }

    /// Identifiers of the currently cached keys, sorted.
    #[must_use]
    pub fn key_ids(&self) -> Vec<String> {
        let mut kids: Vec<String> = self.key_set.keys.read().keys().cloned().collect();
        kids.sort();
        kids
    }

    /// Make one refresh attempt now. On failure the cache is unchanged.
    pub async fn refresh(&self) -> std::result::Result<usize, TokenError> {
        self.key_set.refresh().await
    }

    /// Stop the background refresh task. Calling it again has no effect.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Verify `token` and return its claims.
    pub async fn verify(&self, token: &str) -> std::result::Result<TokenClaims, TokenError> {
        let [header_segment, _, _] = split_token(token)?;
        let header = decode_header(header_segment)?;
        let algorithm = rsa_algorithm(&header.alg)?;

        let key = match self.key_set.key(&header.kid) {
            Some(key) => key,
            None => {
                debug!(kid = %header.kid, "Key not in cache, refreshing key set");
                self.key_set.refresh_with_retry().await?;
                self.key_set
                    .key(&header.kid)
                    .ok_or_else(|| TokenError::KeyNotFound(header.kid.clone()))?
            }
        };

        let payload = verify_signature(token, &key, algorithm)?;
        let claims = TokenClaims::from_payload(payload)?;

        if claims.issuer != self.key_set.issuer {
            return Err(TokenError::IssuerMismatch {
                expected: self.key_set.issuer.clone(),
                actual: claims.issuer,
            });
        }
        if claims.expiry <= Utc::now() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

impl Drop for OidcVerifier {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Refresh `key_set` every `interval` until `shutdown` fires.
///
/// Failures are logged; the previous keys stay in use.
fn spawn_refresh(key_set: Arc<KeySet>, interval: Duration, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; the initial fetch already ran.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!(issuer = %key_set.issuer, "Key set refresh task shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = key_set.refresh().await {
                        warn!(
                            jwks_uri = %key_set.jwks_uri,
                            error = %e,
                            "Background key set refresh failed, keeping cached keys"
                        );
                    }
                }
            }
        }
    });
}

#[derive(Debug, Deserialize)]
struct JoseHeader {
    #[serde(default)]
    alg: String,
    #[serde(default)]
    kid: String,
}

fn split_token(token: &str) -> std::result::Result<[&str; 3], TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    match segments.as_slice() {
        [header, payload, signature] => Ok([*header, *payload, *signature]),
        _ => Err(TokenError::Malformed(format!(
            "expected 3 segments, found {}",
            segments.len()
        ))),
    }
}

fn decode_header(segment: &str) -> std::result::Result<JoseHeader, TokenError> {
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenError::Malformed(format!("header is not base64url: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| TokenError::Malformed(format!("header is not valid JSON: {e}")))
}

fn rsa_algorithm(alg: &str) -> std::result::Result<Algorithm, TokenError> {
    match alg {
        "RS256" => Ok(Algorithm::RS256),
        "RS384" => Ok(Algorithm::RS384),
        "RS512" => Ok(Algorithm::RS512),
        other => Err(TokenError::UnsupportedAlgorithm(other.to_string())),
    }
}

/// Check the signature and return the decoded payload.
///
/// Claim checks are switched off in `jsonwebtoken`; issuer and expiry are
/// checked by the caller so each failure keeps its own kind.
fn verify_signature(
    token: &str,
    key: &DecodingKey,
    algorithm: Algorithm,
) -> std::result::Result<Claims, TokenError> {
    let mut validation = Validation::new(algorithm);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.leeway = 0;

    jsonwebtoken::decode::<Claims>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
            _ => TokenError::Malformed(e.to_string()),
        })
}
