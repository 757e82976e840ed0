//! Executing a single model-requested tool call.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::registry::ToolSet;
use super::tool::{Tool, ToolArgs, ToolError};
use crate::types::ToolCall;

/// Decode the raw argument text of a tool call.
///
/// Blank arguments decode to an empty map. Anything that is not a JSON object
/// is rejected.
pub fn decode_arguments(call: &ToolCall) -> Result<ToolArgs, ToolError> {
    let raw = call.function.arguments.trim();
    if raw.is_empty() {
        return Ok(ToolArgs::new());
    }
    serde_json::from_str::<ToolArgs>(raw).map_err(|e| ToolError::InvalidArguments {
        tool: call.name().to_string(),
        message: e.to_string(),
    })
}

/// Look up, decode and invoke one tool call.
///
/// Resolves to [`ToolError::Cancelled`] if `cancel` fires while the tool runs.
pub async fn handle_tool_call(
    tools: &ToolSet,
    call: &ToolCall,
    cancel: &CancellationToken,
) -> Result<String, ToolError> {
    let tool = tools
        .find(call.name())
        .ok_or_else(|| ToolError::UnknownTool(call.name().to_string()))?;
    let args = decode_arguments(call)?;

    debug!(tool = call.name(), call_id = %call.id, "invoking tool");
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ToolError::Cancelled),
        result = tool.invoke(args) => result,
    }
}
