//! Client configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// JWT-bearer client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Token endpoint the assertion is posted to.
    /// Example: "https://test.maskinporten.no/token"
    #[serde(default)]
    pub token_url: String,

    /// Requested scopes, sent space-joined in the `scope` claim.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Audience (aud claim), the authorization server identifier.
    #[serde(default)]
    pub audience: String,

    /// Issuer (iss claim), the client's integration identifier.
    #[serde(default)]
    pub issuer: String,

    /// Organization number the token is requested on behalf of.
    #[serde(default)]
    pub consumer_organization: String,

    /// Lifetime the assertion claims for itself. Not the access token lifetime.
    #[serde(default = "default_expiry")]
    pub expiry_seconds: u64,

    /// HTTP timeout for the exchange request in seconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

fn default_expiry() -> u64 {
    10
}

fn default_http_timeout() -> u64 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token_url: String::new(),
            scopes: Vec::new(),
            audience: String::new(),
            issuer: String::new(),
            consumer_organization: String::new(),
            expiry_seconds: default_expiry(),
            http_timeout_secs: default_http_timeout(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration with default expiry and timeout.
    pub fn new(
        token_url: impl Into<String>,
        scopes: impl IntoIterator<Item = impl Into<String>>,
        audience: impl Into<String>,
        issuer: impl Into<String>,
        consumer_organization: impl Into<String>,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            scopes: scopes.into_iter().map(Into::into).collect(),
            audience: audience.into(),
            issuer: issuer.into(),
            consumer_organization: consumer_organization.into(),
            ..Default::default()
        }
    }

    /// Override the assertion lifetime.
    pub fn with_expiry_seconds(mut self, expiry_seconds: u64) -> Self {
        self.expiry_seconds = expiry_seconds;
        self
    }

    /// Load a full configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Scopes as sent on the wire.
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.token_url.is_empty() {
            return Err("token_url is required".to_string());
        }

        if !self.token_url.starts_with("https://") && !self.token_url.starts_with("http://") {
            return Err("token_url must be a valid HTTP(S) URL".to_string());
        }

        if self.audience.is_empty() {
            return Err("audience is required".to_string());
        }

        if self.issuer.is_empty() {
            return Err("issuer is required".to_string());
        }

        if self.expiry_seconds == 0 {
            return Err("expiry_seconds must be greater than zero".to_string());
        }

        if self.http_timeout_secs == 0 {
            return Err("http_timeout_secs must be greater than zero".to_string());
        }

        Ok(())
    }
}

/// Partial configuration overlay, used for config files and CLI overrides.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct ClientConfigJson {
    pub token_url: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub audience: Option<String>,
    pub issuer: Option<String>,
    pub consumer_organization: Option<String>,
    pub expiry_seconds: Option<u64>,
    pub http_timeout_secs: Option<u64>,
}

impl ClientConfigJson {
    /// Load an overlay from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Apply JSON config to existing config.
    pub fn apply_to(&self, config: &mut ClientConfig) {
        if let Some(ref url) = self.token_url {
            config.token_url = url.clone();
        }
        if !self.scopes.is_empty() {
            config.scopes = self.scopes.clone();
        }
        if let Some(ref aud) = self.audience {
            config.audience = aud.clone();
        }
        if let Some(ref iss) = self.issuer {
            config.issuer = iss.clone();
        }
        if let Some(ref org) = self.consumer_organization {
            config.consumer_organization = org.clone();
        }
        if let Some(expiry) = self.expiry_seconds {
            config.expiry_seconds = expiry;
        }
        if let Some(timeout) = self.http_timeout_secs {
            config.http_timeout_secs = timeout;
        }
    }
}
