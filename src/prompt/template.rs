//! Minimal prompt template engine.
//!
//! Supported tags:
//! - `{{output_template}}`, `{{prompt}}`, `{{context}}`, `{{max_tool_calls}}`
//! - `{{#if <var>}} ... {{/if}}`, rendered when the variable is non-empty
//!   (strings) or positive (`max_tool_calls`). Blocks do not nest.
//!
//! Whitespace inside the braces is ignored. Any other `{{...}}` is rejected
//! at parse time.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write as _;

use crate::{Error, ErrorContext, Result};

static TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*(#if\s+[A-Za-z_]+|/if|[A-Za-z_]+)\s*\}\}").expect("valid tag pattern")
});

/// Inputs of the structured-call template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredCallParams {
    pub output_template: String,
    pub prompt: String,
    pub context: String,
    pub max_tool_calls: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Var {
    OutputTemplate,
    Prompt,
    Context,
    MaxToolCalls,
}

impl Var {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "output_template" => Some(Var::OutputTemplate),
            "prompt" => Some(Var::Prompt),
            "context" => Some(Var::Context),
            "max_tool_calls" => Some(Var::MaxToolCalls),
            _ => None,
        }
    }

    fn write(self, out: &mut String, params: &StructuredCallParams) {
        match self {
            Var::OutputTemplate => out.push_str(&params.output_template),
            Var::Prompt => out.push_str(&params.prompt),
            Var::Context => out.push_str(&params.context),
            Var::MaxToolCalls => {
                let _ = write!(out, "{}", params.max_tool_calls);
            }
        }
    }

    fn is_truthy(self, params: &StructuredCallParams) -> bool {
        match self {
            Var::OutputTemplate => !params.output_template.is_empty(),
            Var::Prompt => !params.prompt.is_empty(),
            Var::Context => !params.context.is_empty(),
            Var::MaxToolCalls => params.max_tool_calls > 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Text(String),
    Var(Var),
    If { cond: Var, body: Vec<Node> },
}

/// A parsed template. Rendering cannot fail once parsing succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    nodes: Vec<Node>,
}

fn template_error(message: impl Into<String>, offset: usize) -> Error {
    Error::configuration_with_context(
        message,
        ErrorContext::new()
            .with_details(format!("at byte {}", offset))
            .with_source("prompt_template"),
    )
}

fn push_text(nodes: &mut Vec<Node>, text: &str, offset: usize) -> Result<()> {
    if let Some(pos) = text.find("{{") {
        return Err(template_error("unrecognized template tag", offset + pos));
    }
    if !text.is_empty() {
        nodes.push(Node::Text(text.to_string()));
    }
    Ok(())
}

impl PromptTemplate {
    pub fn parse(source: &str) -> Result<Self> {
        let mut nodes = Vec::new();
        // Open `{{#if}}` block: its condition, start offset and collected body.
        let mut open: Option<(Var, usize, Vec<Node>)> = None;
        let mut last = 0;

        for caps in TAG.captures_iter(source) {
            let (Some(whole), Some(tag)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            push_text(
                target_of(&mut open, &mut nodes),
                &source[last..whole.start()],
                last,
            )?;
            last = whole.end();

            let tag = tag.as_str();
            if let Some(name) = tag.strip_prefix("#if") {
                let name = name.trim();
                let cond = Var::parse(name).ok_or_else(|| {
                    template_error(format!("unknown variable `{}` in #if", name), whole.start())
                })?;
                if open.is_some() {
                    return Err(template_error("nested #if blocks are not supported", whole.start()));
                }
                open = Some((cond, whole.start(), Vec::new()));
            } else if tag == "/if" {
                let (cond, _, body) = open
                    .take()
                    .ok_or_else(|| template_error("{{/if}} without matching #if", whole.start()))?;
                nodes.push(Node::If { cond, body });
            } else {
                let var = Var::parse(tag).ok_or_else(|| {
                    template_error(format!("unknown placeholder `{}`", tag), whole.start())
                })?;
                target_of(&mut open, &mut nodes).push(Node::Var(var));
            }
        }

        if let Some((_, start, _)) = open {
            return Err(template_error("unclosed #if block", start));
        }
        push_text(&mut nodes, &source[last..], last)?;

        Ok(Self { nodes })
    }

    pub fn render(&self, params: &StructuredCallParams) -> String {
        let mut out = String::new();
        render_nodes(&self.nodes, params, &mut out);
        out
    }
}

fn target_of<'a>(
    open: &'a mut Option<(Var, usize, Vec<Node>)>,
    nodes: &'a mut Vec<Node>,
) -> &'a mut Vec<Node> {
    match open.as_mut() {
        Some((_, _, body)) => body,
        None => nodes,
    }
}

fn render_nodes(nodes: &[Node], params: &StructuredCallParams, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Var(v) => v.write(out, params),
            Node::If { cond, body } => {
                if cond.is_truthy(params) {
                    render_nodes(body, params, out);
                }
            }
        }
    }
}
