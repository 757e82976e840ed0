//! 模型网关边界：聊天补全与批处理任务接口。
//!
//! # Gateway Module
//!
//! The engines never talk HTTP themselves. Everything goes through
//! [`ModelGateway`], which owns connection handling, authentication, retries
//! and timeouts. Errors returned by a gateway are propagated to the caller
//! unchanged.
//!
//! | Item | Description |
//! |------|-------------|
//! | [`ModelGateway`] | Chat completion plus message-batch API |
//! | [`HttpGateway`] | `reqwest` implementation for OpenAI-compatible chat and batch endpoints |
//! | [`mock::MockGateway`] | Queue-based fake for tests |

pub mod http;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{Message, ToolDeclaration};
use crate::Result;

pub use http::HttpGateway;

/// `processing_status` reported once every item in a batch has resolved.
pub const BATCH_STATUS_ENDED: &str = "ended";

/// Tool choice policy sent alongside tool declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
}

/// One chat-completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    /// System instructions as configured on the request, also present as the
    /// leading `system` message unless history was prefilled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Extended reasoning ("thinking") mode.
    pub think: bool,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDeclaration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub choices: Vec<Choice>,
}

impl ChatCompletionResponse {
    /// Response with a single choice carrying `message`.
    pub fn from_message(message: Message) -> Self {
        Self {
            id: None,
            model: None,
            choices: vec![Choice {
                index: 0,
                message,
                finish_reason: None,
            }],
        }
    }

    pub fn first_message(&self) -> Option<&Message> {
        self.choices.first().map(|c| &c.message)
    }
}

/// Model parameters of one batch entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequestParams {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
}

/// One entry of a batch submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub custom_id: String,
    pub params: BatchRequestParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBatchRequest {
    pub requests: Vec<BatchRequest>,
}

/// Per-outcome item counts of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequestCounts {
    #[serde(default)]
    pub processing: u64,
    #[serde(default)]
    pub succeeded: u64,
    #[serde(default)]
    pub errored: u64,
    #[serde(default)]
    pub canceled: u64,
    #[serde(default)]
    pub expired: u64,
}

impl BatchRequestCounts {
    pub fn total(&self) -> u64 {
        self.processing + self.succeeded + self.errored + self.canceled + self.expired
    }
}

/// A submitted batch job as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: String,
    /// `in_progress`, `canceling` or `ended`.
    pub processing_status: String,
    #[serde(default)]
    pub request_counts: BatchRequestCounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
}

impl Batch {
    pub fn is_ended(&self) -> bool {
        self.processing_status == BATCH_STATUS_ENDED
    }
}

/// Gateway-reported (or locally assigned) error for one batch item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

impl BatchError {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for BatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

impl std::error::Error for BatchError {}

/// Content block of a batch result message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            block_type: "text".to_string(),
            text: Some(text.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResultMessage {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResultBody {
    /// `succeeded`, `errored`, `canceled` or `expired`.
    #[serde(rename = "type")]
    pub result_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<BatchResultMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchError>,
}

/// One line of a finished batch's results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResultEntry {
    pub custom_id: String,
    pub result: BatchResultBody,
}

/// External chat-completion and batch service.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn chat_completion(&self, request: ChatCompletionRequest)
        -> Result<ChatCompletionResponse>;

    async fn create_batch(&self, request: CreateBatchRequest) -> Result<Batch>;

    async fn get_batch(&self, batch_id: &str) -> Result<Batch>;

    async fn get_batch_results(&self, batch_id: &str) -> Result<Vec<BatchResultEntry>>;
}
