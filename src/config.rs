//! Configuration management

use std::{path::Path, sync::Arc, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api_key::ApiKeyAuthenticator;
use crate::authenticator::Authenticator;
use crate::basic::BasicAuthenticator;
use crate::identity::AuthMethod;
use crate::mtls::MtlsAuthenticator;
use crate::multi::MultiAuthenticator;
use crate::oidc::{OidcAuthenticator, VerifierOptions};
use crate::{Error, Result};

/// Environment variable prefix; nested keys are separated by `__`.
pub const ENV_PREFIX: &str = "AUTHN_";

/// Authentication configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Enabled methods, highest priority first
    pub methods: Vec<AuthMethod>,
    /// Basic users: `user:bcryptHash,user:bcryptHash`
    pub basic_users: String,
    /// API keys: `key:name,key:name`
    pub api_keys: String,
    /// OIDC settings
    pub oidc: OidcConfig,
}

/// OIDC bearer-token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OidcConfig {
    /// Issuer base URL; discovery is read from `{issuer}/.well-known/openid-configuration`
    pub issuer: String,
    /// Required audience (empty = not checked)
    pub audience: String,
    /// Background key-set refresh interval
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,
    /// Attempts for the initial and on-miss key-set fetch
    pub retry_attempts: u32,
    /// First retry delay, doubled on each further retry
    #[serde(with = "humantime_serde")]
    pub retry_base_delay: Duration,
    /// HTTP request timeout for discovery and key-set fetches
    #[serde(with = "humantime_serde")]
    pub http_timeout: Duration,
}

impl Default for OidcConfig {
    fn default() -> Self {
        let options = VerifierOptions::default();
        Self {
            issuer: String::new(),
            audience: String::new(),
            refresh_interval: options.refresh_interval,
            retry_attempts: options.retry_attempts,
            retry_base_delay: options.retry_base_delay,
            http_timeout: options.http_timeout,
        }
    }
}

impl OidcConfig {
    /// Verifier options derived from this config.
    #[must_use]
    pub fn verifier_options(&self) -> VerifierOptions {
        VerifierOptions {
            refresh_interval: self.refresh_interval,
            retry_attempts: self.retry_attempts,
            retry_base_delay: self.retry_base_delay,
            http_timeout: self.http_timeout,
        }
    }
}

impl AuthConfig {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        Self::from_figment(&figment)
    }

    /// Extract from an already assembled figment.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        figment.extract().map_err(|e| Error::Config(e.to_string()))
    }

    /// Build the authenticator described by this config.
    ///
    /// One method yields that strategy on its own; several yield a
    /// [`MultiAuthenticator`] in the listed order.
    pub async fn build(&self) -> Result<Arc<dyn Authenticator>> {
        self.validate_methods()?;

        let mut authenticators: Vec<Arc<dyn Authenticator>> =
            Vec::with_capacity(self.methods.len());
        for method in &self.methods {
            authenticators.push(self.build_method(*method).await?);
        }

        info!(methods = ?self.methods, "Authentication configured");
        if authenticators.len() == 1 {
            Ok(authenticators.remove(0))
        } else {
            Ok(Arc::new(MultiAuthenticator::new(authenticators)))
        }
    }

    fn validate_methods(&self) -> Result<()> {
        if self.methods.is_empty() {
            return Err(Error::Config("no authentication methods configured".to_string()));
        }
        for (i, method) in self.methods.iter().enumerate() {
            if matches!(method, AuthMethod::None | AuthMethod::Multi) {
                return Err(Error::Config(format!(
                    "'{method}' cannot be listed as an authentication method"
                )));
            }
            if self.methods[..i].contains(method) {
                return Err(Error::Config(format!(
                    "authentication method '{method}' listed twice"
                )));
            }
        }
        Ok(())
    }

    async fn build_method(&self, method: AuthMethod) -> Result<Arc<dyn Authenticator>> {
        let authenticator: Arc<dyn Authenticator> = match method {
            AuthMethod::Mtls => Arc::new(MtlsAuthenticator::new()),
            AuthMethod::Basic => Arc::new(BasicAuthenticator::new(&self.basic_users)?),
            AuthMethod::ApiKey => Arc::new(ApiKeyAuthenticator::new(&self.api_keys)?),
            AuthMethod::Oidc => Arc::new(
                OidcAuthenticator::from_issuer(
                    self.oidc.issuer.clone(),
                    self.oidc.audience.clone(),
                    self.oidc.verifier_options(),
                )
                .await?,
            ),
            AuthMethod::None | AuthMethod::Multi => {
                return Err(Error::Config(format!(
                    "'{method}' cannot be listed as an authentication method"
                )));
            }
        };
        Ok(authenticator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn from_yaml(yaml: &str) -> Result<AuthConfig> {
        AuthConfig::from_figment(&Figment::from(Yaml::string(yaml)))
    }

    #[test]
    fn parses_yaml_with_humantime_durations() {
        let config = from_yaml(
            r"
methods: [apikey, oidc]
api_keys: 'k1:billing'
oidc:
  issuer: https://idp.example.com
  audience: api-1
  refresh_interval: 5m
  retry_base_delay: 250ms
",
        )
        .unwrap();

        assert_eq!(config.methods, vec![AuthMethod::ApiKey, AuthMethod::Oidc]);
        assert_eq!(config.api_keys, "k1:billing");
        assert_eq!(config.oidc.issuer, "https://idp.example.com");
        assert_eq!(config.oidc.refresh_interval, Duration::from_secs(300));
        assert_eq!(config.oidc.retry_base_delay, Duration::from_millis(250));
        // unspecified fields keep their defaults
        assert_eq!(config.oidc.retry_attempts, 3);
        assert_eq!(config.oidc.http_timeout, Duration::from_secs(10));
    }

    #[test]
    fn unknown_method_is_a_config_error() {
        let err = from_yaml("methods: [kerberos]").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn method_list_is_validated() {
        let mut config = AuthConfig::default();
        assert!(config.validate_methods().is_err());

        config.methods = vec![AuthMethod::Basic, AuthMethod::None];
        assert!(config.validate_methods().is_err());

        config.methods = vec![AuthMethod::Multi];
        assert!(config.validate_methods().is_err());

        config.methods = vec![AuthMethod::ApiKey, AuthMethod::ApiKey];
        assert!(config.validate_methods().is_err());

        config.methods = vec![AuthMethod::Mtls, AuthMethod::ApiKey];
        assert!(config.validate_methods().is_ok());
    }

    #[test]
    fn verifier_options_follow_config() {
        let config = OidcConfig {
            retry_attempts: 7,
            ..OidcConfig::default()
        };
        assert_eq!(config.verifier_options().retry_attempts, 7);
    }
}
