//! 类型系统模块：对话消息与工具调用的核心数据类型。
//!
//! # Types Module
//!
//! Wire-level data model shared by the turn loop, the batch engine and the
//! gateway boundary.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | One conversation turn (role, text, images, tool calls) |
//! | [`MessageRole`] | `system`, `user`, `assistant` or `tool` |
//! | [`ToolCall`] | Function/tool call requested by the model |
//! | [`ToolDeclaration`] | Tool definition advertised to the model |
//! | [`ParameterSchema`] | JSON-Schema-like argument description |

pub mod message;
pub mod tool;

pub use message::{ImageData, Message, MessageRole};
pub use tool::{FunctionCall, FunctionDefinition, ParameterSchema, ToolCall, ToolDeclaration};
