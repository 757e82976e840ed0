use crate::client::core::Client;
use crate::config::{GatewayConfig, DEFAULT_BATCH_MAX_TOKENS};
use crate::gateway::{HttpGateway, ModelGateway};
use crate::tools::{Tool, ToolRegistry};
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;

/// Builder for creating clients with custom configuration.
///
/// Keep this surface area small and predictable.
pub struct ClientBuilder {
    gateway: Option<Arc<dyn ModelGateway>>,
    config: Option<GatewayConfig>,
    tools: Vec<Arc<dyn Tool>>,
    batch_max_tokens: Option<u32>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            gateway: None,
            config: None,
            tools: Vec::new(),
            batch_max_tokens: None,
        }
    }

    /// Use a custom gateway. Takes precedence over [`config`](Self::config).
    pub fn gateway(mut self, gateway: Arc<dyn ModelGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Build an [`HttpGateway`] from this configuration.
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Register a client-level tool.
    pub fn tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    /// Override `max_tokens` for batch entries.
    ///
    /// Defaults to the gateway config's value, or
    /// `AI_STRUCTURED_BATCH_MAX_TOKENS`, or 4096.
    pub fn batch_max_tokens(mut self, max_tokens: u32) -> Self {
        self.batch_max_tokens = Some(max_tokens);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<Client> {
        let (gateway, config_tokens): (Arc<dyn ModelGateway>, Option<u32>) =
            match (self.gateway, self.config) {
                (Some(gw), cfg) => (gw, cfg.map(|c| c.batch_max_tokens)),
                (None, Some(cfg)) => (Arc::new(HttpGateway::new(&cfg)?), Some(cfg.batch_max_tokens)),
                (None, None) => {
                    return Err(Error::configuration_with_context(
                        "no gateway configured",
                        ErrorContext::new()
                            .with_details("call gateway() or config() before build()")
                            .with_source("client_builder"),
                    ))
                }
            };

        let env_tokens = std::env::var("AI_STRUCTURED_BATCH_MAX_TOKENS")
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok());
        let batch_max_tokens = self
            .batch_max_tokens
            .or(config_tokens)
            .or(env_tokens)
            .unwrap_or(DEFAULT_BATCH_MAX_TOKENS);

        let tools = ToolRegistry::new();
        for tool in self.tools {
            tools.register_shared(tool);
        }

        Ok(Client {
            gateway,
            tools,
            batch_max_tokens,
        })
    }
}
