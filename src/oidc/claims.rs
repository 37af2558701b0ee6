//! Registered claims read from a verified token payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::TokenError;
use crate::identity::Claims;

/// Claims of a token whose signature has been verified.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenClaims {
    /// `sub`
    pub subject: String,
    /// `aud`, normalised to a list
    pub audience: Vec<String>,
    /// `iss`
    pub issuer: String,
    /// `exp`
    pub expiry: DateTime<Utc>,
    /// The full payload, custom claims included
    pub claims: Claims,
}

impl TokenClaims {
    /// `true` when `audience` lists `expected` exactly.
    #[must_use]
    pub fn has_audience(&self, expected: &str) -> bool {
        self.audience.iter().any(|aud| aud == expected)
    }

    /// Read the registered claims out of a decoded payload.
    ///
    /// The payload is kept whole in [`claims`](Self::claims); the registered
    /// fields are decoded from it separately. A missing `exp` is treated as
    /// already expired.
    pub(crate) fn from_payload(payload: Claims) -> Result<Self, TokenError> {
        let registered: RegisteredClaims = serde_json::from_value(Value::Object(payload.clone()))
            .map_err(|e| TokenError::Malformed(format!("invalid claims: {e}")))?;

        let expiry = match registered.exp {
            Some(exp) => numeric_date(exp)
                .ok_or_else(|| TokenError::Malformed(format!("exp out of range: {exp}")))?,
            None => DateTime::UNIX_EPOCH,
        };

        Ok(Self {
            subject: registered.sub,
            audience: registered.aud,
            issuer: registered.iss,
            expiry,
            claims: payload,
        })
    }
}

/// JWT `NumericDate`: seconds since the epoch, fractions dropped.
#[allow(clippy::cast_possible_truncation)]
fn numeric_date(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp(secs.trunc() as i64, 0)
}

#[derive(Debug, Deserialize)]
struct RegisteredClaims {
    #[serde(default)]
    sub: String,
    #[serde(default, deserialize_with = "deserialize_audience")]
    aud: Vec<String>,
    #[serde(default)]
    iss: String,
    #[serde(default)]
    exp: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// `aud` may be a single string or an array of strings.
fn deserialize_audience<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(aud)) => vec![aud],
        Some(OneOrMany::Many(auds)) => auds,
    })
}
