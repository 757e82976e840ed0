//! Schema-based shape descriptions.

use serde_json::json;

/// JSON schema for `T`, generated with `schemars`.
pub fn json_schema_from_type<T: schemars::JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(&schema).unwrap_or_else(|_| json!({}))
}

/// Pretty-printed JSON schema for `T`, ready to return from
/// [`OutputShape::describe_shape`](super::OutputShape::describe_shape).
///
/// Useful for recursive types or enums, where the serialized example hides
/// most of the structure.
pub fn schema_description<T: schemars::JsonSchema>() -> String {
    let schema = json_schema_from_type::<T>();
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| schema.to_string())
}
