//! Interactive structured call: model turns interleaved with tool calls.
//!
//! ```text
//! AwaitingModel --(tool calls)--> HandlingTools --> AwaitingModel
//!      |
//!      +--(final text, decodes)--> Done
//!      +--(gateway error / decode error / cancel)--> Failed
//! ```
//!
//! The tool budget is a loop-local counter. Tools are declared to the model
//! only while budget remains. Every call the model makes gets exactly one
//! result message, since OpenAI-compatible gateways reject a history with
//! unanswered calls. Once the budget is spent, mid-turn or on a later turn,
//! the remaining calls are answered with a budget-exhausted error and never
//! executed.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::request::{Response, StructuredRequest};
use crate::gateway::{ChatCompletionRequest, ModelGateway, ToolChoice};
use crate::structured::{parse_structured, OutputShape};
use crate::tools::{handle_tool_call, ToolError, ToolSet};
use crate::types::{Message, ToolCall, ToolDeclaration};
use crate::{Error, Result};

/// Turn loop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnState {
    AwaitingModel,
    HandlingTools,
    Done,
    Failed,
}

/// What a tool-handling pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ToolPass {
    pub executed: u32,
    pub refused: u32,
}

pub(crate) struct TurnLoop<'a> {
    gateway: &'a dyn ModelGateway,
    tools: ToolSet,
    declarations: Vec<ToolDeclaration>,
    cancel: CancellationToken,
    trace: Vec<TurnState>,
}

impl<'a> TurnLoop<'a> {
    pub(crate) fn new(gateway: &'a dyn ModelGateway, tools: ToolSet, cancel: CancellationToken) -> Self {
        let declarations = tools.declarations();
        Self {
            gateway,
            tools,
            declarations,
            cancel,
            trace: Vec::new(),
        }
    }

    fn enter(&mut self, state: TurnState) {
        debug!(?state, "turn loop state");
        self.trace.push(state);
    }

    fn fail(&mut self, err: Error) -> Error {
        self.enter(TurnState::Failed);
        err
    }

    fn build_request(
        &self,
        req: &StructuredRequest<impl Sized>,
        messages: &[Message],
        budget: u32,
    ) -> ChatCompletionRequest {
        let offer_tools = budget > 0 && !self.declarations.is_empty();
        ChatCompletionRequest {
            model: req.model.clone(),
            system: req.system_text(),
            think: req.think_enabled(),
            messages: messages.to_vec(),
            tools: if offer_tools {
                self.declarations.clone()
            } else {
                Vec::new()
            },
            tool_choice: offer_tools.then_some(ToolChoice::Auto),
        }
    }

    pub(crate) async fn run<T: OutputShape>(
        mut self,
        req: &StructuredRequest<T>,
    ) -> Result<Response<T>> {
        let mut messages = match req.initial_messages(req.max_tool_calls) {
            Ok(m) => m,
            Err(e) => return Err(self.fail(e)),
        };
        let mut budget = req.max_tool_calls;
        let mut executed = 0u32;

        loop {
            self.enter(TurnState::AwaitingModel);
            if self.cancel.is_cancelled() {
                return Err(self.fail(Error::Cancelled));
            }

            let request = self.build_request(req, &messages, budget);
            debug!(
                messages = request.messages.len(),
                tools = request.tools.len(),
                budget,
                "sending completion request"
            );
            let cancel = self.cancel.clone();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::Cancelled),
                r = self.gateway.chat_completion(request) => r,
            };
            let resp = match outcome {
                Ok(r) => r,
                Err(e) => return Err(self.fail(e)),
            };

            let message = match resp.first_message() {
                Some(m) => m.clone(),
                None => {
                    let err = crate::error::TransportError::Decode(
                        "completion response contained no choices".to_string(),
                    );
                    return Err(self.fail(err.into()));
                }
            };

            if !message.has_tool_calls() {
                debug!(output = %message.content, "model output");
                let parsed = match parse_structured::<T>(&message.content) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(error = %e, "failed to decode model output");
                        return Err(self.fail(e));
                    }
                };
                if !parsed.comment.is_empty() {
                    info!(comment = %parsed.comment, "model sent a message along with its output");
                }
                self.enter(TurnState::Done);
                return Ok(Response {
                    output: parsed.output,
                    model_comment: parsed.comment,
                    raw_response: resp,
                    input_messages: messages,
                    tool_calls_executed: executed,
                    trace: self.trace,
                });
            }

            info!(count = message.tool_calls.len(), "model requested tool calls");
            let calls = message.tool_calls.clone();
            messages.push(message);
            self.enter(TurnState::HandlingTools);

            let pass = match self.handle_tools(&calls, &mut messages, budget).await {
                Ok(p) => p,
                Err(e) => return Err(self.fail(e)),
            };
            budget -= pass.executed;
            executed += pass.executed;
            debug!(
                executed = pass.executed,
                refused = pass.refused,
                remaining = budget,
                "tool calls handled"
            );
        }
    }

    /// Answer the turn's tool calls in order, appending one result message per
    /// call. Calls past the budget are refused without running.
    pub(crate) async fn handle_tools(
        &self,
        calls: &[ToolCall],
        messages: &mut Vec<Message>,
        budget: u32,
    ) -> Result<ToolPass> {
        let mut pass = ToolPass::default();

        for call in calls {
            if pass.executed >= budget {
                warn!(tool = call.name(), "tool call requested with no budget left");
                messages.push(Message::tool_result(
                    call.id.clone(),
                    ToolError::BudgetExhausted.to_model_text(),
                ));
                pass.refused += 1;
                continue;
            }

            debug!(tool = call.name(), arguments = %call.function.arguments, "tool call");
            let text = match handle_tool_call(&self.tools, call, &self.cancel).await {
                Ok(text) => text,
                Err(ToolError::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    let text = e.to_model_text();
                    warn!(tool = call.name(), error = %text, "tool call error (sending to model)");
                    text
                }
            };
            messages.push(Message::tool_result(call.id.clone(), text));
            pass.executed += 1;
        }
        Ok(pass)
    }
}
