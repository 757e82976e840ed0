//! 提示词渲染模块：把输出结构、任务提示与上下文组合成发送给模型的消息。
//!
//! # Prompt Module
//!
//! Renders the user message of a structured call. Rendering is a pure
//! function of [`StructuredCallParams`] and the selected template; it never
//! touches the gateway, so it can be tested in isolation.
//!
//! Templates are selected per request: an override registered under
//! [`PROMPT_TYPE_STRUCTURED_CALL`] wins, otherwise
//! [`DEFAULT_STRUCTURED_CALL_PROMPT`] is used. A malformed override is a
//! configuration error for that request.

pub mod template;

use std::collections::HashMap;

pub use template::{PromptTemplate, StructuredCallParams};

use crate::{Error, Result};

/// Template kind for the structured-call user message.
pub const PROMPT_TYPE_STRUCTURED_CALL: &str = "structured_call";

/// Built-in structured-call template.
pub const DEFAULT_STRUCTURED_CALL_PROMPT: &str = "When responding, ensure your output matches the following template strictly, output only json, starting with the { character
<output_template>
{{output_template}}
</output_template>
{{prompt}}
{{#if max_tool_calls}}
Make at most {{max_tool_calls}} tool calls.
{{/if}}
<context_for_task>
{{context}}
</context_for_task>";

/// Template text for `kind`, honoring per-request overrides.
pub fn template_source<'a>(overrides: Option<&'a HashMap<String, String>>, kind: &str) -> &'a str {
    overrides
        .and_then(|o| o.get(kind))
        .map(String::as_str)
        .unwrap_or(DEFAULT_STRUCTURED_CALL_PROMPT)
}

/// Render the structured-call user message.
pub fn render_structured_call(
    overrides: Option<&HashMap<String, String>>,
    params: &StructuredCallParams,
) -> Result<String> {
    let source = template_source(overrides, PROMPT_TYPE_STRUCTURED_CALL);
    let template = PromptTemplate::parse(source).map_err(|e| match e {
        Error::Configuration { message, context } => Error::Configuration {
            message: format!("failed to parse prompt template: {}", message),
            context: context
                .with_field_path(format!("prompt_override.{}", PROMPT_TYPE_STRUCTURED_CALL)),
        },
        other => other,
    })?;
    Ok(template.render(params))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(max_tool_calls: u32) -> StructuredCallParams {
        StructuredCallParams {
            output_template: r#"{"label":""}"#.into(),
            prompt: "classify sentiment".into(),
            context: "I love this".into(),
            max_tool_calls,
        }
    }

    #[test]
    fn default_template_contract() {
        let text = render_structured_call(None, &params(0)).unwrap();
        assert!(text.contains("output only json"));
        assert!(text.contains("starting with the { character"));
        assert!(text.contains("<output_template>\n{\"label\":\"\"}\n</output_template>"));
        assert!(text.contains("classify sentiment"));
        assert!(text.contains("<context_for_task>\nI love this\n</context_for_task>"));
        assert!(!text.contains("tool calls"));
    }

    #[test]
    fn default_template_states_budget() {
        let text = render_structured_call(None, &params(4)).unwrap();
        assert!(text.contains("Make at most 4 tool calls."));
    }

    #[test]
    fn override_is_used() {
        let mut overrides = HashMap::new();
        overrides.insert(
            PROMPT_TYPE_STRUCTURED_CALL.to_string(),
            "{{prompt}} => {{output_template}}".to_string(),
        );
        let text = render_structured_call(Some(&overrides), &params(0)).unwrap();
        assert_eq!(text, r#"classify sentiment => {"label":""}"#);
    }

    #[test]
    fn unrelated_override_falls_back_to_default() {
        let mut overrides = HashMap::new();
        overrides.insert("other".to_string(), "{{prompt}}".to_string());
        assert_eq!(
            template_source(Some(&overrides), PROMPT_TYPE_STRUCTURED_CALL),
            DEFAULT_STRUCTURED_CALL_PROMPT
        );
    }

    #[test]
    fn malformed_override_names_the_field() {
        let mut overrides = HashMap::new();
        overrides.insert(
            PROMPT_TYPE_STRUCTURED_CALL.to_string(),
            "{{#if prompt}}".to_string(),
        );
        let err = render_structured_call(Some(&overrides), &params(0)).unwrap_err();
        let ctx = err.context().unwrap();
        assert_eq!(
            ctx.field_path.as_deref(),
            Some("prompt_override.structured_call")
        );
        assert!(err.to_string().contains("failed to parse prompt template"));
    }
}
