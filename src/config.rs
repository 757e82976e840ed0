//! Configuration for the bundled HTTP gateway.
//!
//! The engines themselves take all their inputs from the request; only
//! [`HttpGateway`](crate::gateway::HttpGateway) reads this.

use serde::{Deserialize, Serialize};
use std::env;

use crate::{Error, ErrorContext, Result};

/// Default `max_tokens` of every batch entry.
pub const DEFAULT_BATCH_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// API key. Takes precedence over `api_key_env`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub batch_max_tokens: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            api_key: None,
            api_key_env: "AI_STRUCTURED_API_KEY".to_string(),
            timeout_secs: 120,
            batch_max_tokens: DEFAULT_BATCH_MAX_TOKENS,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse::<T>().ok())
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `AI_STRUCTURED_BASE_URL`, `AI_HTTP_TIMEOUT_SECS`
    /// and `AI_STRUCTURED_BATCH_MAX_TOKENS`.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(url) = env::var("AI_STRUCTURED_BASE_URL") {
            cfg.base_url = url;
        }
        if let Some(t) = env_parse::<u64>("AI_HTTP_TIMEOUT_SECS") {
            cfg.timeout_secs = t;
        }
        if let Some(m) = env_parse::<u32>("AI_STRUCTURED_BATCH_MAX_TOKENS") {
            cfg.batch_max_tokens = m;
        }
        cfg
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(yaml).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid gateway config: {}", e),
                ErrorContext::new().with_source("gateway_config"),
            )
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Explicit key, else the configured environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| env::var(&self.api_key_env).ok())
            .filter(|k| !k.is_empty())
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base_url: {}", e),
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_details(self.base_url.clone())
                    .with_source("gateway_config"),
            )
        })?;
        if self.timeout_secs == 0 {
            return Err(Error::configuration_with_context(
                "timeout_secs must be positive",
                ErrorContext::new()
                    .with_field_path("timeout_secs")
                    .with_source("gateway_config"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let cfg = GatewayConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.batch_max_tokens, 4096);
    }

    #[test]
    fn yaml_fills_missing_fields_with_defaults() {
        let cfg = GatewayConfig::from_yaml_str(
            "base_url: https://gateway.example.com/v1\ntimeout_secs: 5\n",
        )
        .unwrap();
        assert_eq!(cfg.base_url, "https://gateway.example.com/v1");
        assert_eq!(cfg.timeout_secs, 5);
        assert_eq!(cfg.api_key_env, "AI_STRUCTURED_API_KEY");
    }

    #[test]
    fn invalid_url_is_rejected() {
        let err = GatewayConfig::from_yaml_str("base_url: not a url\n").unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("base_url")
        );
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let cfg = GatewayConfig::default().with_timeout_secs(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn explicit_key_wins() {
        let cfg = GatewayConfig::default().with_api_key("sk-test");
        assert_eq!(cfg.resolve_api_key().as_deref(), Some("sk-test"));
    }
}
