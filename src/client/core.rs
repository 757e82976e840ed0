use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, Instrument};
use uuid::Uuid;

use super::batch::{self, BatchResponse};
use super::request::{Response, StructuredRequest};
use super::turn_loop::TurnLoop;
use crate::config::{GatewayConfig, DEFAULT_BATCH_MAX_TOKENS};
use crate::gateway::{HttpGateway, ModelGateway};
use crate::structured::OutputShape;
use crate::tools::{Tool, ToolRegistry};
use crate::Result;

/// Entry point for structured calls and batch jobs.
///
/// A client holds no per-request state besides its tool registry, so one
/// client can drive many requests concurrently. Register tools before the
/// first request starts.
pub struct Client {
    pub(crate) gateway: Arc<dyn ModelGateway>,
    pub(crate) tools: ToolRegistry,
    pub(crate) batch_max_tokens: u32,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("tools", &self.tools.names())
            .field("batch_max_tokens", &self.batch_max_tokens)
            .finish()
    }
}

impl Client {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            gateway,
            tools: ToolRegistry::new(),
            batch_max_tokens: DEFAULT_BATCH_MAX_TOKENS,
        }
    }

    /// Client over the bundled [`HttpGateway`].
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let gateway = HttpGateway::new(config)?;
        Ok(Self::new(Arc::new(gateway)).with_batch_max_tokens(config.batch_max_tokens))
    }

    pub fn with_batch_max_tokens(mut self, max_tokens: u32) -> Self {
        self.batch_max_tokens = max_tokens;
        self
    }

    /// Client-level tools, available to every request.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn register_tool(&self, tool: impl Tool + 'static) -> &Self {
        self.tools.register(tool);
        self
    }

    pub fn gateway(&self) -> &Arc<dyn ModelGateway> {
        &self.gateway
    }

    /// Drive a request to a decoded `T`, executing tool calls along the way.
    pub async fn call_structured<T: OutputShape>(
        &self,
        req: &StructuredRequest<T>,
    ) -> Result<Response<T>> {
        self.call_structured_with_cancel(req, CancellationToken::new())
            .await
    }

    /// Like [`call_structured`](Self::call_structured), stopping with
    /// [`Error::Cancelled`](crate::Error::Cancelled) once `cancel` fires.
    ///
    /// Cancellation interrupts an outstanding gateway call or tool invocation.
    /// History appended before that point is left as is.
    pub async fn call_structured_with_cancel<T: OutputShape>(
        &self,
        req: &StructuredRequest<T>,
        cancel: CancellationToken,
    ) -> Result<Response<T>> {
        let run_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("structured_call", run_id = %run_id, model = %req.model);

        async move {
            let start = std::time::Instant::now();
            let tools = self.tools.merged_with(&req.tools);
            let result = TurnLoop::new(self.gateway.as_ref(), tools, cancel)
                .run(req)
                .await;
            match &result {
                Ok(resp) => info!(
                    tool_calls = resp.tool_calls_executed,
                    turns = resp.model_turns(),
                    duration_ms = start.elapsed().as_millis(),
                    "structured call finished"
                ),
                Err(e) => info!(
                    error = %e,
                    duration_ms = start.elapsed().as_millis(),
                    "structured call failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Submit `requests` as one batch job against `model`.
    ///
    /// Tools are not offered in batch mode. Item `i` is correlated as
    /// `request-{i}`.
    pub async fn submit_batch<T: OutputShape>(
        &self,
        model: &str,
        requests: &[StructuredRequest<T>],
    ) -> Result<BatchResponse<T>> {
        batch::submit(self.gateway.as_ref(), model, requests, self.batch_max_tokens).await
    }

    /// Current status of a batch; decoded item results once it has ended.
    ///
    /// Safe to call repeatedly. Every call re-fetches and re-decodes.
    pub async fn batch_results<T: OutputShape>(&self, batch_id: &str) -> Result<BatchResponse<T>> {
        batch::poll(self.gateway.as_ref(), batch_id).await
    }
}
