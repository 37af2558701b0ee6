//! Discovery document and JWK Set fetching.

use std::collections::HashMap;

use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use tracing::debug;

use super::TokenError;
use crate::{Error, Result};

/// Path of the discovery document relative to the issuer.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Signing keys by `kid`.
pub(crate) type KeyMap = HashMap<String, DecodingKey>;

/// The part of the discovery document this crate needs.
#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    #[serde(default)]
    jwks_uri: String,
}

/// A JWK Set document.
#[derive(Debug, Deserialize)]
pub(crate) struct JwkSetDocument {
    #[serde(default)]
    keys: Vec<Jwk>,
}

/// A single JSON Web Key; only the RSA members are read.
#[derive(Debug, Deserialize)]
struct Jwk {
    #[serde(default)]
    kty: String,
    #[serde(default, rename = "use")]
    key_use: String,
    #[serde(default)]
    kid: String,
    #[serde(default)]
    alg: String,
    #[serde(default)]
    n: String,
    #[serde(default)]
    e: String,
}

/// Discovery URL for `issuer`.
pub(crate) fn discovery_url(issuer: &str) -> String {
    format!("{}{DISCOVERY_PATH}", issuer.trim_end_matches('/'))
}

/// Resolve the issuer's `jwks_uri` through its discovery document.
pub(crate) async fn discover_jwks_uri(http: &reqwest::Client, issuer: &str) -> Result<String> {
    let url = discovery_url(issuer);
    debug!(%url, "Fetching OIDC discovery document");

    let response = http
        .get(&url)
        .send()
        .await
        .map_err(|e| Error::Discovery(format!("{url}: {e}")))?;
    if !response.status().is_success() {
        return Err(Error::Discovery(format!(
            "{url}: HTTP {}",
            response.status()
        )));
    }

    let document: DiscoveryDocument = response
        .json()
        .await
        .map_err(|e| Error::Discovery(format!("{url}: invalid document: {e}")))?;
    if document.jwks_uri.is_empty() {
        return Err(Error::Discovery(format!("{url}: no jwks_uri")));
    }

    Ok(document.jwks_uri)
}

/// Fetch the key set at `jwks_uri` and convert it to a [`KeyMap`].
pub(crate) async fn fetch_key_set(
    http: &reqwest::Client,
    jwks_uri: &str,
) -> std::result::Result<KeyMap, TokenError> {
    let response = http
        .get(jwks_uri)
        .send()
        .await
        .map_err(|e| TokenError::JwksFetchFailed(e.to_string()))?;
    if !response.status().is_success() {
        return Err(TokenError::JwksFetchFailed(format!(
            "HTTP {} from JWKS endpoint",
            response.status()
        )));
    }

    let document: JwkSetDocument = response
        .json()
        .await
        .map_err(|e| TokenError::JwksFetchFailed(format!("invalid JWKS document: {e}")))?;

    Ok(parse_key_set(document))
}

/// Keep the usable RSA signing keys of a key set.
///
/// Keys of another type, keys meant for encryption, keys without `kid`, and
/// keys whose components do not decode are skipped rather than failing the
/// whole set.
pub(crate) fn parse_key_set(document: JwkSetDocument) -> KeyMap {
    let mut keys = KeyMap::new();

    for jwk in document.keys {
        if jwk.kty != "RSA" {
            debug!(kid = %jwk.kid, kty = %jwk.kty, "Skipping non-RSA key");
            continue;
        }
        if !(jwk.key_use.is_empty() || jwk.key_use == "sig") {
            debug!(kid = %jwk.kid, key_use = %jwk.key_use, "Skipping non-signing key");
            continue;
        }
        if jwk.kid.is_empty() {
            debug!("Skipping key without kid");
            continue;
        }

        match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
            Ok(key) => {
                debug!(kid = %jwk.kid, alg = %jwk.alg, "Loaded signing key");
                keys.insert(jwk.kid, key);
            }
            Err(e) => debug!(kid = %jwk.kid, error = %e, "Skipping undecodable key"),
        }
    }

    keys
}
