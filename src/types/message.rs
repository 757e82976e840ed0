//! Conversation messages exchanged with the model gateway.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::tool::ToolCall;

/// One turn of a conversation.
///
/// Conversation state is an ordered `Vec<Message>` that only ever grows while
/// a structured call runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn with_content(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            content: text.into(),
            images: Vec::new(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::with_content(MessageRole::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::with_content(MessageRole::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_content(MessageRole::Assistant, text)
    }

    /// Assistant turn that asks for tool invocations.
    pub fn assistant_tool_calls(text: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::assistant(text)
        }
    }

    /// Tool result bound to the call that produced it.
    pub fn tool_result(call_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::with_content(MessageRole::Tool, text)
        }
    }

    pub fn with_images(mut self, images: impl IntoIterator<Item = ImageData>) -> Self {
        self.images.extend(images);
        self
    }

    pub fn contains_image(&self) -> bool {
        !self.images.is_empty()
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// Base64-encoded image attached to a user message.
///
/// The payload is opaque to this crate; it is handed to the gateway as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageData(pub String);

impl ImageData {
    pub fn base64(data: impl Into<String>) -> Self {
        Self(data.into())
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Ok(Self::from_bytes(&bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
