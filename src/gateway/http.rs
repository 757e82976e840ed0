use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    Batch, BatchError, BatchResultBody, BatchResultEntry, ChatCompletionRequest,
    ChatCompletionResponse, CreateBatchRequest, ModelGateway,
};
use crate::config::GatewayConfig;
use crate::error::TransportError;
use crate::{Error, Result};

/// Error kind for a result line the gateway sent in an unexpected shape.
pub const INVALID_RESULT: &str = "invalid_result";

/// [`ModelGateway`] over HTTP.
///
/// Endpoints, relative to `base_url`:
/// - `POST /chat/completions` (OpenAI-compatible body plus `think`)
/// - `POST /batches`, `GET /batches/{id}`
/// - `GET /batches/{id}/results`, one JSON result per line
///
/// No retries are attempted; non-2xx responses become
/// [`TransportError::Status`].
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(TransportError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.resolve_api_key(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<String> {
        let url = self.url(path);
        debug!(%method, %url, "gateway request");

        let mut req = self.client.request(method, &url);
        if let Some(body) = body {
            req = req.json(body);
        }
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(TransportError::Http)?;
        let status = resp.status();
        let text = resp.text().await.map_err(TransportError::Http)?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            }
            .into());
        }
        Ok(text)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let text = self.send(method, path, body).await?;
        serde_json::from_str(&text).map_err(|e| Error::from(TransportError::Decode(e.to_string())))
    }
}

#[async_trait]
impl ModelGateway for HttpGateway {
    async fn chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        let mut body = serde_json::to_value(&request)?;
        // System text is already the leading message (or replaced by prefilled history).
        if let Some(obj) = body.as_object_mut() {
            obj.remove("system");
        }
        self.send_json(Method::POST, "/chat/completions", Some(&body))
            .await
    }

    async fn create_batch(&self, request: CreateBatchRequest) -> Result<Batch> {
        let body = serde_json::to_value(&request)?;
        self.send_json(Method::POST, "/batches", Some(&body)).await
    }

    async fn get_batch(&self, batch_id: &str) -> Result<Batch> {
        self.send_json(Method::GET, &format!("/batches/{}", batch_id), None)
            .await
    }

    async fn get_batch_results(&self, batch_id: &str) -> Result<Vec<BatchResultEntry>> {
        let text = self
            .send(Method::GET, &format!("/batches/{}/results", batch_id), None)
            .await?;
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(decode_result_line)
            .collect()
    }
}

/// Decode one JSONL result line.
///
/// A line that does not match the result shape but still names its
/// `custom_id` becomes an `errored` entry for that item. Anything else fails
/// the whole read.
fn decode_result_line(line: &str) -> Result<BatchResultEntry> {
    let err = match serde_json::from_str::<BatchResultEntry>(line) {
        Ok(entry) => return Ok(entry),
        Err(e) => e,
    };
    let custom_id = serde_json::from_str::<serde_json::Value>(line)
        .ok()
        .and_then(|v| v.get("custom_id")?.as_str().map(str::to_string));
    match custom_id {
        Some(custom_id) => {
            warn!(%custom_id, error = %err, "undecodable batch result line");
            Ok(BatchResultEntry {
                custom_id,
                result: BatchResultBody {
                    result_type: "errored".to_string(),
                    message: None,
                    error: Some(BatchError::new(
                        INVALID_RESULT,
                        format!("result line could not be decoded: {}", err),
                    )),
                },
            })
        }
        None => Err(Error::from(TransportError::Decode(err.to_string()))),
    }
}
