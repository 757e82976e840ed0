//! Tools the model may call during a structured request.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Tool`] | Capability trait: name, description, parameter schema, `invoke` |
//! | [`tool_fn`] | Wrap an async closure as a tool |
//! | [`ToolRegistry`] | Client-level tools keyed by name |
//! | [`ToolSet`] | Registry tools plus request-scoped tools for one call |
//! | [`handle_tool_call`] | Decode arguments and invoke the requested tool |
//!
//! Tool failures never abort a structured call. Unknown names, undecodable
//! arguments and errors from the tool itself are all turned into an
//! `Error: ...` string and sent back to the model as the tool result.

pub mod dispatch;
pub mod registry;
pub mod tool;

pub use dispatch::{decode_arguments, handle_tool_call};
pub use registry::{ToolRegistry, ToolSet};
pub use tool::{tool_fn, FnTool, Tool, ToolArgs, ToolError};
