//! Splitting raw model text into commentary and a JSON payload.
//!
//! Models often wrap the payload in a ```` ```json ```` fence or put a sentence
//! of prose in front of it. Prose *before* the payload is kept as the model
//! comment. Prose *after* the payload is not stripped here; decoding reads
//! only the first well-formed JSON value and ignores any trailing bytes.

use serde::de::DeserializeOwned;

use crate::{Error, Result};

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Trim whitespace and a surrounding ```` ```json ... ``` ```` fence.
pub fn clean_json_output(s: &str) -> String {
    let output = s.trim();
    let output = output.strip_prefix(JSON_FENCE).unwrap_or(output);
    let output = output.strip_suffix(FENCE).unwrap_or(output);
    output.trim().to_string()
}

/// Separate any text before the JSON from the JSON itself.
///
/// Expects already-cleaned text. Returns `(comment, json)`. The payload starts
/// at the first line beginning with `{`; everything before it, trimmed, is the
/// comment. When no line starts with `{` the whole text is the comment and the
/// payload is empty.
pub fn extract_json_and_comment(output: &str) -> (String, String) {
    if output.starts_with('{') {
        return (String::new(), output.to_string());
    }

    let lines: Vec<&str> = output.split('\n').collect();
    match lines.iter().position(|l| l.starts_with('{')) {
        Some(i) => (
            lines[..i].join("\n").trim().to_string(),
            lines[i..].join("\n"),
        ),
        None => (output.to_string(), String::new()),
    }
}

/// Clean and split raw model text in one step. Returns `(comment, payload)`.
pub fn extract(raw: &str) -> (String, String) {
    extract_json_and_comment(&clean_json_output(raw))
}

/// Decode the leading JSON value of `payload` into `T`.
///
/// Bytes after the first complete value are ignored. An empty payload yields
/// [`Error::NoStructuredOutput`]; malformed JSON or a shape mismatch yields
/// [`Error::Parse`]. Both carry `raw` for diagnostics.
pub fn decode_payload<T: DeserializeOwned>(payload: &str, raw: &str) -> Result<T> {
    if payload.trim().is_empty() {
        return Err(Error::NoStructuredOutput {
            raw: raw.to_string(),
        });
    }

    let mut values = serde_json::Deserializer::from_str(payload).into_iter::<T>();
    match values.next() {
        Some(Ok(v)) => Ok(v),
        Some(Err(source)) => Err(Error::Parse {
            source,
            raw: raw.to_string(),
        }),
        None => Err(Error::NoStructuredOutput {
            raw: raw.to_string(),
        }),
    }
}

/// A decoded payload together with the prose the model put in front of it.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted<T> {
    pub output: T,
    pub comment: String,
}

/// Extract and decode raw model text.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<Extracted<T>> {
    let cleaned = clean_json_output(raw);
    let (comment, payload) = extract_json_and_comment(&cleaned);
    let output = decode_payload(&payload, &cleaned)?;
    Ok(Extracted { output, comment })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct A {
        a: i64,
    }

    #[test]
    fn bare_payload_has_no_comment() {
        assert_eq!(
            extract(r#"{"a":1}"#),
            (String::new(), r#"{"a":1}"#.to_string())
        );
    }

    #[test]
    fn fenced_payload_with_leading_prose() {
        let raw = "```json\n hello\n{\"a\":1}\n```";
        assert_eq!(
            extract(raw),
            ("hello".to_string(), r#"{"a":1}"#.to_string())
        );
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let raw = "  \n```json\n{\"a\":2}\n```\n\n";
        assert_eq!(clean_json_output(raw), r#"{"a":2}"#);
    }

    #[test]
    fn multi_line_comment_is_kept() {
        let raw = "Sure.\nHere you go:\n{\n  \"a\": 3\n}";
        let (comment, payload) = extract(raw);
        assert_eq!(comment, "Sure.\nHere you go:");
        assert_eq!(payload, "{\n  \"a\": 3\n}");
    }

    #[test]
    fn indented_brace_does_not_start_payload() {
        let (comment, payload) = extract("note:\n  {\"a\":1}");
        assert_eq!(comment, "note:\n  {\"a\":1}");
        assert!(payload.is_empty());
    }

    #[test]
    fn no_payload_line_means_all_comment() {
        let (comment, payload) = extract("I could not find anything.");
        assert_eq!(comment, "I could not find anything.");
        assert_eq!(payload, "");

        let err = decode_payload::<A>(&payload, "I could not find anything.").unwrap_err();
        assert!(matches!(err, Error::NoStructuredOutput { .. }));
    }

    #[test]
    fn trailing_chatter_is_ignored() {
        let parsed = parse_structured::<A>("{\"a\":7}\nLet me know if you need more.").unwrap();
        assert_eq!(parsed.output, A { a: 7 });
        assert_eq!(parsed.comment, "");
    }

    #[test]
    fn malformed_payload_is_parse_error_with_raw_text() {
        let err = parse_structured::<A>("result:\n{\"a\": }").unwrap_err();
        match err {
            Error::Parse { raw, .. } => assert_eq!(raw, "result:\n{\"a\": }"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn shape_mismatch_is_parse_error() {
        let err = parse_structured::<A>(r#"{"a":"one"}"#).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }
}
