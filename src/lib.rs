//! # ai-lib-structured
//!
//! 结构化生成与工具编排引擎：从聊天模型获取强类型结果。
//!
//! Structured generation and tool orchestration on top of a chat-completion
//! gateway: describe the shape you want, let the model call your tools, get a
//! typed value back.
//!
//! ## Overview
//!
//! A [`StructuredRequest<T>`] carries a task prompt, per-call context, optional
//! tools and a tool-call budget. The client renders it into a prompt that asks
//! for JSON shaped like `T`, exchanges turns with the model (executing tool
//! calls in between) and decodes the final answer into `T`. The same request
//! can instead be submitted as part of a batch job and reconciled later.
//!
//! ## Key Features
//!
//! - **Output shapes**: any `Serialize + DeserializeOwned + Default` type via [`OutputShape`]
//! - **Lenient extraction**: prose before the payload is kept as a comment, code fences are stripped
//! - **Bounded tool loop**: tools are only offered while the budget lasts
//! - **Batching**: submit many requests as one job, poll for typed per-item results
//! - **Prompt overrides**: replace the built-in template per request
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_lib_structured::{Client, GatewayConfig, OutputShape, StructuredRequest};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct Sentiment {
//!     label: String,
//! }
//!
//! impl OutputShape for Sentiment {}
//!
//! #[tokio::main]
//! async fn main() -> ai_lib_structured::Result<()> {
//!     let client = Client::from_config(&GatewayConfig::from_env())?;
//!
//!     let req = StructuredRequest::<Sentiment>::new("gpt-4o-mini", "classify sentiment")
//!         .context("I love this");
//!     let resp = client.call_structured(&req).await?;
//!     println!("{}", resp.output.label);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Client, requests, turn loop and batch engine |
//! | [`structured`] | Output shapes and response extraction |
//! | [`prompt`] | Prompt templates and overrides |
//! | [`tools`] | Tool trait, registry and dispatch |
//! | [`gateway`] | Model gateway boundary, HTTP and mock implementations |
//! | [`types`] | Messages and tool-call wire types |
//! | [`config`] | Gateway configuration |

pub mod client;
pub mod config;
pub mod gateway;
pub mod prompt;
pub mod structured;
pub mod tools;
pub mod types;

// Re-export main types for convenience
pub use client::{
    BatchOutcome, BatchResponse, BatchResult, Client, ClientBuilder, Response, StructuredRequest,
    TurnState,
};
pub use config::GatewayConfig;
pub use gateway::ModelGateway;
pub use structured::OutputShape;
pub use tools::{tool_fn, Tool, ToolArgs, ToolError, ToolRegistry};
pub use types::{
    message::{ImageData, Message, MessageRole},
    tool::{ParameterSchema, ToolCall},
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext, TransportError};
