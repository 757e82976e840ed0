//! Structured request and response types.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::config::DEFAULT_BATCH_MAX_TOKENS;
use crate::gateway::{BatchRequest, BatchRequestParams, ChatCompletionResponse};
use crate::prompt::{render_structured_call, StructuredCallParams};
use crate::structured::{render_output_spec, OutputShape};
use crate::tools::Tool;
use crate::types::{ImageData, Message};
use crate::Result;

use super::turn_loop::TurnState;

/// One structured-generation task producing a `T`.
pub struct StructuredRequest<T> {
    pub model: String,

    /// System prompt for the model. Ignored when `message_prefill` is set.
    pub system: String,

    /// What the model should do, essentially the function definition.
    pub prompt: String,

    /// Input for this specific task. When running the same prompt over many
    /// inputs, this is the field that varies.
    pub context: String,

    /// Chat history sent before the rendered prompt. Replaces the system
    /// message, so include one here if it is needed.
    pub message_prefill: Vec<Message>,

    pub images: Vec<ImageData>,

    /// Maximum number of tool invocations. `0` disables tool use.
    pub max_tool_calls: u32,

    /// Request-scoped tools, appended after the client's registry.
    pub tools: Vec<Arc<dyn Tool>>,

    /// Template overrides keyed by template kind (`"structured_call"`).
    pub prompt_override: Option<HashMap<String, String>>,

    /// Extended reasoning mode. `None` means enabled.
    pub think: Option<bool>,

    _shape: PhantomData<fn() -> T>,
}

impl<T> Default for StructuredRequest<T> {
    fn default() -> Self {
        Self {
            model: String::new(),
            system: String::new(),
            prompt: String::new(),
            context: String::new(),
            message_prefill: Vec::new(),
            images: Vec::new(),
            max_tool_calls: 0,
            tools: Vec::new(),
            prompt_override: None,
            think: None,
            _shape: PhantomData,
        }
    }
}

impl<T> Clone for StructuredRequest<T> {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
            system: self.system.clone(),
            prompt: self.prompt.clone(),
            context: self.context.clone(),
            message_prefill: self.message_prefill.clone(),
            images: self.images.clone(),
            max_tool_calls: self.max_tool_calls,
            tools: self.tools.clone(),
            prompt_override: self.prompt_override.clone(),
            think: self.think,
            _shape: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for StructuredRequest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tools: Vec<&str> = self.tools.iter().map(|t| t.name()).collect();
        f.debug_struct("StructuredRequest")
            .field("model", &self.model)
            .field("system", &self.system)
            .field("prompt", &self.prompt)
            .field("context", &self.context)
            .field("message_prefill", &self.message_prefill.len())
            .field("images", &self.images.len())
            .field("max_tool_calls", &self.max_tool_calls)
            .field("tools", &tools)
            .field("think", &self.think)
            .finish()
    }
}

impl<T> StructuredRequest<T> {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn message_prefill(mut self, messages: Vec<Message>) -> Self {
        self.message_prefill = messages;
        self
    }

    pub fn image(mut self, image: ImageData) -> Self {
        self.images.push(image);
        self
    }

    pub fn max_tool_calls(mut self, max: u32) -> Self {
        self.max_tool_calls = max;
        self
    }

    pub fn tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn shared_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn prompt_override(mut self, kind: impl Into<String>, template: impl Into<String>) -> Self {
        self.prompt_override
            .get_or_insert_with(HashMap::new)
            .insert(kind.into(), template.into());
        self
    }

    pub fn think(mut self, enabled: bool) -> Self {
        self.think = Some(enabled);
        self
    }

    /// Effective reasoning flag.
    pub fn think_enabled(&self) -> bool {
        self.think.unwrap_or(true)
    }

    /// Prefilled history, or the system message if one is set.
    pub(crate) fn seed_messages(&self) -> Vec<Message> {
        if !self.message_prefill.is_empty() {
            self.message_prefill.clone()
        } else if !self.system.is_empty() {
            vec![Message::system(self.system.clone())]
        } else {
            Vec::new()
        }
    }

    pub(crate) fn system_text(&self) -> Option<String> {
        (!self.system.is_empty()).then(|| self.system.clone())
    }
}

impl<T: OutputShape> StructuredRequest<T> {
    /// Render the user message content for the given tool budget.
    pub fn render_prompt(&self, max_tool_calls: u32) -> Result<String> {
        let output_template = render_output_spec::<T>()?;
        render_structured_call(
            self.prompt_override.as_ref(),
            &StructuredCallParams {
                output_template,
                prompt: self.prompt.clone(),
                context: self.context.clone(),
                max_tool_calls,
            },
        )
    }

    /// The conversation the first model turn starts from.
    pub fn initial_messages(&self, max_tool_calls: u32) -> Result<Vec<Message>> {
        let content = self.render_prompt(max_tool_calls)?;
        let mut msgs = self.seed_messages();
        msgs.push(Message::user(content).with_images(self.images.iter().cloned()));
        Ok(msgs)
    }

    /// Batch entry for this request. Tools are never offered in batch mode.
    pub fn to_batch_request(
        &self,
        custom_id: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Result<BatchRequest> {
        Ok(BatchRequest {
            custom_id: custom_id.into(),
            params: BatchRequestParams {
                model: model.into(),
                max_tokens,
                messages: self.initial_messages(0)?,
            },
        })
    }

    /// Size in bytes of this request serialized as a batch entry.
    ///
    /// Useful for staying under batch API payload limits.
    pub fn estimate_request_size(&self) -> Result<usize> {
        let entry = BatchRequest {
            custom_id: "estimate".to_string(),
            params: BatchRequestParams {
                model: self.model.clone(),
                max_tokens: DEFAULT_BATCH_MAX_TOKENS,
                messages: self.initial_messages(self.max_tool_calls)?,
            },
        };
        Ok(serde_json::to_vec(&entry)?.len())
    }
}

/// Result of a successful structured call.
#[derive(Debug, Clone)]
pub struct Response<T> {
    pub output: T,
    /// Prose the model wrote before the payload, trimmed. Empty if none.
    pub model_comment: String,
    /// The final gateway response.
    pub raw_response: ChatCompletionResponse,
    /// History sent with the final model turn.
    pub input_messages: Vec<Message>,
    /// Tool invocations actually executed.
    pub tool_calls_executed: u32,
    /// States the turn loop went through, ending in [`TurnState::Done`].
    pub trace: Vec<TurnState>,
}

impl<T> Response<T> {
    /// Number of model turns, i.e. completion requests sent.
    pub fn model_turns(&self) -> usize {
        self.trace
            .iter()
            .filter(|s| **s == TurnState::AwaitingModel)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageRole;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Label {
        label: String,
    }

    impl OutputShape for Label {}

    fn request() -> StructuredRequest<Label> {
        StructuredRequest::new("m", "classify sentiment").context("I love this")
    }

    #[test]
    fn think_defaults_to_enabled() {
        assert!(request().think_enabled());
        assert!(!request().think(false).think_enabled());
    }

    #[test]
    fn system_message_leads_when_no_prefill() {
        let msgs = request().system("be terse").initial_messages(0).unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, MessageRole::System);
        assert_eq!(msgs[1].role, MessageRole::User);
        assert!(msgs[1].content.contains("I love this"));
    }

    #[test]
    fn prefill_replaces_system() {
        let msgs = request()
            .system("ignored")
            .message_prefill(vec![Message::user("earlier"), Message::assistant("ok")])
            .initial_messages(0)
            .unwrap();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].content, "earlier");
        assert!(msgs.iter().all(|m| m.content != "ignored"));
    }

    #[test]
    fn images_attach_to_user_message() {
        let msgs = request()
            .image(ImageData::base64("aGk="))
            .initial_messages(0)
            .unwrap();
        assert_eq!(msgs[0].images, vec![ImageData::base64("aGk=")]);
    }

    #[test]
    fn batch_entry_never_mentions_tool_budget() {
        let entry = request()
            .max_tool_calls(5)
            .to_batch_request("request-0", "batch-model", 1024)
            .unwrap();
        assert_eq!(entry.params.model, "batch-model");
        assert_eq!(entry.params.max_tokens, 1024);
        assert!(!entry.params.messages[0].content.contains("tool calls"));
    }

    #[test]
    fn estimate_matches_serialized_entry() {
        let req = request();
        let expected = serde_json::to_vec(&BatchRequest {
            custom_id: "estimate".into(),
            params: BatchRequestParams {
                model: "m".into(),
                max_tokens: 4096,
                messages: req.initial_messages(0).unwrap(),
            },
        })
        .unwrap()
        .len();
        assert_eq!(req.estimate_request_size().unwrap(), expected);
    }

    #[test]
    fn malformed_override_fails_estimate() {
        let req = request().prompt_override("structured_call", "{{oops}}");
        assert!(req.estimate_request_size().is_err());
    }
}
