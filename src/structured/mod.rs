//! Structured output module.
//!
//! Turns a Rust type into something a model can be asked to produce, and turns
//! what the model produced back into that type:
//! - [`OutputShape`]: target types and their prompt description
//! - [`extract`]: split raw model text into `(comment, payload)`
//! - [`decode_payload`]: lenient decode of the leading JSON value
//!
//! # Examples
//!
//! ```
//! use ai_lib_structured::structured::parse_structured;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Label {
//!     label: String,
//! }
//!
//! let parsed = parse_structured::<Label>("Here it is:\n{\"label\": \"positive\"}").unwrap();
//! assert_eq!(parsed.output.label, "positive");
//! assert_eq!(parsed.comment, "Here it is:");
//! ```

pub mod extract;
pub mod schema;
pub mod shape;

pub use extract::{
    clean_json_output, decode_payload, extract, extract_json_and_comment, parse_structured,
    Extracted,
};
pub use schema::{json_schema_from_type, schema_description};
pub use shape::{render_output_spec, OutputShape};
