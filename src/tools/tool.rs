//! Tool capability trait and closure-backed implementation.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

use crate::types::{ParameterSchema, ToolDeclaration};

/// Decoded tool arguments.
pub type ToolArgs = serde_json::Map<String, serde_json::Value>;

/// Why a tool call could not produce a result.
///
/// Every variant is rendered to text and sent back to the model as the
/// tool's output, so the model can correct itself.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for tool {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("tool call budget exhausted, no more tool calls will be executed; respond with your final answer")]
    BudgetExhausted,

    #[error("tool call cancelled")]
    Cancelled,

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl ToolError {
    pub fn message(msg: impl Into<String>) -> Self {
        ToolError::Message(msg.into())
    }

    /// Text delivered to the model in place of a tool result.
    pub fn to_model_text(&self) -> String {
        format!("Error: {}", self)
    }
}

/// A named capability the model may invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name within a registry.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> ParameterSchema;

    /// Run the tool. The returned text is fed to the model verbatim.
    async fn invoke(&self, args: ToolArgs) -> Result<String, ToolError>;

    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration::function(self.name(), self.description(), self.parameters())
    }
}

type Handler = dyn Fn(ToolArgs) -> BoxFuture<'static, Result<String, ToolError>> + Send + Sync;

/// A tool backed by an async closure. Created via [`tool_fn`].
#[derive(Clone)]
pub struct FnTool {
    name: String,
    description: String,
    parameters: ParameterSchema,
    handler: Arc<Handler>,
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> ParameterSchema {
        self.parameters.clone()
    }

    async fn invoke(&self, args: ToolArgs) -> Result<String, ToolError> {
        (self.handler)(args).await
    }
}

/// Wrap an async closure as a [`Tool`].
///
/// ```
/// use ai_lib_structured::tools::{tool_fn, Tool, ToolError};
/// use ai_lib_structured::types::ParameterSchema;
///
/// let echo = tool_fn(
///     "echo",
///     "Repeat the given text",
///     ParameterSchema::object()
///         .typed_property("text", "string", "Text to repeat")
///         .required(["text"]),
///     |args| async move {
///         args.get("text")
///             .and_then(|v| v.as_str())
///             .map(str::to_string)
///             .ok_or_else(|| ToolError::message("missing text"))
///     },
/// );
/// assert_eq!(echo.name(), "echo");
/// ```
pub fn tool_fn<F, Fut>(
    name: impl Into<String>,
    description: impl Into<String>,
    parameters: ParameterSchema,
    handler: F,
) -> FnTool
where
    F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
{
    FnTool {
        name: name.into(),
        description: description.into(),
        parameters,
        handler: Arc::new(
            move |args| -> BoxFuture<'static, Result<String, ToolError>> {
                Box::pin(handler(args))
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fn_tool_invokes_closure() {
        let add = tool_fn("add", "Add a and b", ParameterSchema::object(), |args| async move {
            let a = args.get("a").and_then(|v| v.as_i64()).unwrap_or(0);
            let b = args.get("b").and_then(|v| v.as_i64()).unwrap_or(0);
            Ok((a + b).to_string())
        });

        let mut args = ToolArgs::new();
        args.insert("a".into(), 2.into());
        args.insert("b".into(), 3.into());
        assert_eq!(add.invoke(args).await.unwrap(), "5");
    }

    #[test]
    fn declaration_uses_tool_metadata() {
        let t = tool_fn("noop", "Does nothing", ParameterSchema::object(), |_| async {
            Ok(String::new())
        });
        let decl = t.declaration();
        assert_eq!(decl.name(), "noop");
        assert_eq!(decl.function.description, "Does nothing");
    }

    #[test]
    fn errors_render_for_the_model() {
        let err = ToolError::from(anyhow::anyhow!("disk full"));
        assert_eq!(err.to_model_text(), "Error: disk full");
        assert_eq!(
            ToolError::UnknownTool("x".into()).to_model_text(),
            "Error: unknown tool: x"
        );
    }
}
