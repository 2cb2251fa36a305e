//! Client configuration.
//!
//! The caller owns a `ClientConfig` and hands it to the client and transport
//! constructors. Nothing here reads the environment.

use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

/// Where the Linkding instance lives and how to authenticate against it.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: String,
    /// Upper bound for a whole request, applied by transports that support it.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    /// Build a config without validation.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            timeout: None,
        }
    }

    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

// The token must never end up in logs.
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Validating builder for [`ClientConfig`].
#[derive(Debug, Default, Clone)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    token: Option<String>,
    timeout: Option<Duration>,
}

impl ClientConfigBuilder {
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Validate and produce the config.
    ///
    /// The base URL must be an absolute `http` or `https` URL and the token
    /// must be non-empty.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let base_url = self
            .base_url
            .filter(|u| !u.trim().is_empty())
            .ok_or(ConfigError::MissingBaseUrl)?;

        match Url::parse(&base_url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => return Err(ConfigError::InvalidBaseUrl { url: base_url }),
        }

        let token = self
            .token
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        Ok(ClientConfig {
            base_url,
            token,
            timeout: self.timeout,
        })
    }
}
