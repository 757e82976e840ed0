//! Output shape descriptions embedded in the structured-call prompt.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Error, ErrorContext, Result};

/// A type the model can be asked to produce.
///
/// By default the prompt describes the shape by example: a `Default` value of
/// the type is serialized to JSON and shown to the model. This is a best-effort
/// description, not a schema. Optional and nested fields appear with their
/// zero representation (`null`, `""`, `[]`, `0`), which can under-specify what
/// the model is allowed to return.
///
/// Override [`OutputShape::describe_shape`] for anything the example form
/// cannot express (enums with data, recursive types, value constraints). The
/// returned text is embedded verbatim.
///
/// ```
/// use ai_lib_structured::OutputShape;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Default, Serialize, Deserialize)]
/// struct Sentiment {
///     label: String,
/// }
///
/// impl OutputShape for Sentiment {}
///
/// assert_eq!(
///     ai_lib_structured::structured::render_output_spec::<Sentiment>().unwrap(),
///     r#"{"label":""}"#
/// );
/// ```
pub trait OutputShape: Serialize + DeserializeOwned + Default {
    /// Custom description used instead of the serialized example.
    fn describe_shape() -> Option<String> {
        None
    }
}

/// Render the textual output specification for `T`.
pub fn render_output_spec<T: OutputShape>() -> Result<String> {
    if let Some(description) = T::describe_shape() {
        return Ok(description);
    }

    serde_json::to_string(&T::default()).map_err(|e| {
        Error::configuration_with_context(
            format!("failed to render output spec: {}", e),
            ErrorContext::new()
                .with_details(std::any::type_name::<T>())
                .with_source("output_shape"),
        )
    })
}
