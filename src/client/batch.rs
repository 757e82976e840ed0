//! Batch engine: many independent structured requests submitted as one job.
//!
//! Submission renders each request exactly like the first turn of an
//! interactive call (tool budget forced to zero) and tags it with a
//! positional correlation id, `request-{index}`. Polling is idempotent and
//! only decodes item results once the gateway reports the batch as ended.
//! Item failures stay local to the item, and every submitted item yields
//! exactly one result: duplicates are dropped and items the gateway left out
//! are reported as [`ERR_MISSING_RESULT`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::request::StructuredRequest;
use crate::gateway::{
    Batch, BatchError, BatchRequestCounts, BatchResultEntry, CreateBatchRequest, ModelGateway,
};
use crate::structured::{parse_structured, OutputShape};
use crate::{Error, ErrorContext, Result};

pub const ERR_MISSING_MESSAGE: &str = "missing_message";
pub const ERR_MISSING_CONTENT: &str = "missing_content";
pub const ERR_NO_JSON_OUTPUT: &str = "no_json_output";
pub const ERR_PARSING: &str = "parsing_error";
pub const ERR_MISSING_RESULT: &str = "missing_result";

const CUSTOM_ID_PREFIX: &str = "request-";

/// Correlation id of the request at `index`.
pub fn custom_id(index: usize) -> String {
    format!("{}{}", CUSTOM_ID_PREFIX, index)
}

fn index_of(custom_id: &str) -> Option<usize> {
    custom_id.strip_prefix(CUSTOM_ID_PREFIX)?.parse().ok()
}

/// How a batch item resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchOutcome {
    Succeeded,
    Errored,
    Canceled,
    Expired,
    /// Outcome type this crate does not know about, kept verbatim.
    #[serde(untagged)]
    Unknown(String),
}

impl BatchOutcome {
    pub fn from_type(result_type: &str) -> Self {
        match result_type {
            "succeeded" => Self::Succeeded,
            "errored" => Self::Errored,
            "canceled" => Self::Canceled,
            "expired" => Self::Expired,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Errored => "errored",
            Self::Canceled => "canceled",
            Self::Expired => "expired",
            Self::Unknown(s) => s,
        }
    }
}

impl std::fmt::Display for BatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded result of one batch item.
///
/// `output` is only set for a `Succeeded` item whose text decoded. A
/// `Succeeded` item that failed locally carries one of the `ERR_*` kinds in
/// `error`.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult<T> {
    pub custom_id: String,
    pub outcome: BatchOutcome,
    pub output: Option<T>,
    pub model_comment: String,
    pub error: Option<BatchError>,
}

impl<T> BatchResult<T> {
    fn new(custom_id: String, outcome: BatchOutcome) -> Self {
        Self {
            custom_id,
            outcome,
            output: None,
            model_comment: String::new(),
            error: None,
        }
    }

    fn failed(mut self, error: BatchError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome == BatchOutcome::Succeeded && self.output.is_some()
    }
}

/// Status of a batch job plus, once ended, its decoded items.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResponse<T> {
    pub batch_id: String,
    pub status: String,
    pub request_counts: BatchRequestCounts,
    /// `None` until the batch has ended.
    pub results: Option<Vec<BatchResult<T>>>,
    pub raw_batch: Batch,
}

impl<T> BatchResponse<T> {
    fn from_batch(batch: Batch) -> Self {
        Self {
            batch_id: batch.id.clone(),
            status: batch.processing_status.clone(),
            request_counts: batch.request_counts,
            results: None,
            raw_batch: batch,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.raw_batch.is_ended()
    }
}

/// Resolve one gateway result line into a typed item.
pub fn reconcile_entry<T: OutputShape>(entry: BatchResultEntry) -> BatchResult<T> {
    let outcome = BatchOutcome::from_type(&entry.result.result_type);
    let result = BatchResult::new(entry.custom_id, outcome.clone());

    match outcome {
        BatchOutcome::Succeeded => {}
        BatchOutcome::Errored => {
            let error = entry.result.error.unwrap_or_else(|| {
                BatchError::new("unknown_error", "gateway reported an error without details")
            });
            return result.failed(error);
        }
        _ => return result,
    }

    let message = match entry.result.message {
        Some(m) => m,
        None => {
            return result.failed(BatchError::new(
                ERR_MISSING_MESSAGE,
                "succeeded result has no message",
            ))
        }
    };

    if message.content.is_empty() {
        return result.failed(BatchError::new(
            ERR_MISSING_CONTENT,
            "succeeded result has no content blocks",
        ));
    }
    // Blocks without text fall through to the extractor as an empty string.
    let text: String = message
        .content
        .iter()
        .filter(|b| b.block_type == "text")
        .filter_map(|b| b.text.as_deref())
        .collect();

    match parse_structured::<T>(&text) {
        Ok(parsed) => BatchResult {
            output: Some(parsed.output),
            model_comment: parsed.comment,
            ..result
        },
        Err(e @ Error::NoStructuredOutput { .. }) => {
            result.failed(BatchError::new(ERR_NO_JSON_OUTPUT, e.to_string()))
        }
        Err(e) => result.failed(BatchError::new(ERR_PARSING, e.to_string())),
    }
}

/// Reconcile the entries of a batch of `submitted` requests, ordered by
/// submission position.
///
/// The first entry for an id wins. Each position in `0..submitted` with no
/// entry gets an `Errored` result carrying [`ERR_MISSING_RESULT`]. Entries
/// whose id is not a positional id sort after the rest, in the order the
/// gateway returned them.
pub fn reconcile_results<T: OutputShape>(
    entries: Vec<BatchResultEntry>,
    submitted: usize,
) -> Vec<BatchResult<T>> {
    let mut seen = HashSet::new();
    let mut results: Vec<BatchResult<T>> = Vec::with_capacity(submitted.max(entries.len()));
    for entry in entries {
        if !seen.insert(entry.custom_id.clone()) {
            debug!(custom_id = %entry.custom_id, "dropping duplicate batch result");
            continue;
        }
        results.push(reconcile_entry(entry));
    }

    for id in (0..submitted).map(custom_id).filter(|id| !seen.contains(id)) {
        warn!(custom_id = %id, "gateway returned no result for batch item");
        results.push(BatchResult::new(id, BatchOutcome::Errored).failed(BatchError::new(
            ERR_MISSING_RESULT,
            "gateway returned no result for this request",
        )));
    }

    results.sort_by_key(|r| index_of(&r.custom_id).unwrap_or(usize::MAX));
    results
}

pub(crate) async fn submit<T: OutputShape>(
    gateway: &dyn ModelGateway,
    model: &str,
    requests: &[StructuredRequest<T>],
    max_tokens: u32,
) -> Result<BatchResponse<T>> {
    if requests.is_empty() {
        return Err(Error::configuration_with_context(
            "batch request list is empty",
            ErrorContext::new()
                .with_field_path("requests")
                .with_source("batch_engine"),
        ));
    }

    let entries = requests
        .iter()
        .enumerate()
        .map(|(i, req)| {
            req.to_batch_request(custom_id(i), model, max_tokens)
                .map_err(|e| match e {
                    Error::Configuration { message, context } => Error::Configuration {
                        message,
                        context: context.with_field_path(format!("requests[{}]", i)),
                    },
                    other => other,
                })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(count = entries.len(), model, max_tokens, "submitting batch");
    let batch = gateway
        .create_batch(CreateBatchRequest { requests: entries })
        .await?;
    info!(batch_id = %batch.id, status = %batch.processing_status, "batch submitted");
    Ok(BatchResponse::from_batch(batch))
}

pub(crate) async fn poll<T: OutputShape>(
    gateway: &dyn ModelGateway,
    batch_id: &str,
) -> Result<BatchResponse<T>> {
    let batch = gateway.get_batch(batch_id).await?;
    let mut response = BatchResponse::from_batch(batch);
    if !response.is_ended() {
        debug!(batch_id, status = %response.status, "batch not ended yet");
        return Ok(response);
    }

    let entries = gateway.get_batch_results(batch_id).await?;
    let submitted = response.request_counts.total() as usize;
    let results = reconcile_results::<T>(entries, submitted);
    let failed = results.iter().filter(|r| !r.is_success()).count();
    if failed > 0 {
        warn!(batch_id, failed, total = results.len(), "batch items without output");
    }
    response.results = Some(results);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{BatchResultBody, BatchResultMessage, ContentBlock};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Label {
        label: String,
    }

    impl OutputShape for Label {}

    fn succeeded(id: &str, blocks: Vec<ContentBlock>) -> BatchResultEntry {
        BatchResultEntry {
            custom_id: id.to_string(),
            result: BatchResultBody {
                result_type: "succeeded".into(),
                message: Some(BatchResultMessage { content: blocks }),
                error: None,
            },
        }
    }

    fn kind(r: &BatchResult<Label>) -> Option<&str> {
        r.error.as_ref().map(|e| e.error_type.as_str())
    }

    #[test]
    fn text_blocks_are_concatenated() {
        let r = reconcile_entry::<Label>(succeeded(
            "request-0",
            vec![
                ContentBlock::text("Sure.\n{\"label\":"),
                ContentBlock {
                    block_type: "thinking".into(),
                    text: Some("ignored".into()),
                },
                ContentBlock::text(" \"positive\"}"),
            ],
        ));
        assert_eq!(r.output, Some(Label { label: "positive".into() }));
        assert_eq!(r.model_comment, "Sure.");
        assert!(r.error.is_none());
    }

    #[test]
    fn local_failure_kinds() {
        let mut no_message = succeeded("request-0", vec![]);
        no_message.result.message = None;
        assert_eq!(kind(&reconcile_entry(no_message)), Some(ERR_MISSING_MESSAGE));

        let empty = succeeded("request-1", vec![]);
        assert_eq!(kind(&reconcile_entry(empty)), Some(ERR_MISSING_CONTENT));

        // blocks are present but carry no text
        let blank = succeeded(
            "request-1",
            vec![
                ContentBlock::text(""),
                ContentBlock {
                    block_type: "thinking".into(),
                    text: Some("{\"label\":\"x\"}".into()),
                },
            ],
        );
        assert_eq!(kind(&reconcile_entry(blank)), Some(ERR_NO_JSON_OUTPUT));

        let prose = succeeded("request-2", vec![ContentBlock::text("no idea")]);
        assert_eq!(kind(&reconcile_entry(prose)), Some(ERR_NO_JSON_OUTPUT));

        let bad = succeeded("request-3", vec![ContentBlock::text("{\"label\": 3}")]);
        assert_eq!(kind(&reconcile_entry(bad)), Some(ERR_PARSING));
    }

    #[test]
    fn errored_carries_gateway_error() {
        let entry = BatchResultEntry {
            custom_id: "request-0".into(),
            result: BatchResultBody {
                result_type: "errored".into(),
                message: None,
                error: Some(BatchError::new("overloaded_error", "try later")),
            },
        };
        let r = reconcile_entry::<Label>(entry);
        assert_eq!(r.outcome, BatchOutcome::Errored);
        assert_eq!(kind(&r), Some("overloaded_error"));
        assert!(r.output.is_none());
    }

    #[test]
    fn results_follow_submission_order() {
        let entries = vec![
            succeeded("request-10", vec![ContentBlock::text("{\"label\":\"c\"}")]),
            succeeded("other", vec![ContentBlock::text("{\"label\":\"d\"}")]),
            succeeded("request-2", vec![ContentBlock::text("{\"label\":\"b\"}")]),
            succeeded("request-0", vec![ContentBlock::text("{\"label\":\"a\"}")]),
        ];
        let ids: Vec<String> = reconcile_results::<Label>(entries, 0)
            .into_iter()
            .map(|r| r.custom_id)
            .collect();
        assert_eq!(ids, vec!["request-0", "request-2", "request-10", "other"]);
    }

    #[test]
    fn one_result_per_submitted_item() {
        let entries = vec![
            succeeded("request-2", vec![ContentBlock::text("{\"label\":\"c\"}")]),
            succeeded("request-0", vec![ContentBlock::text("{\"label\":\"a\"}")]),
            succeeded("request-0", vec![ContentBlock::text("{\"label\":\"dup\"}")]),
        ];
        let results = reconcile_results::<Label>(entries, 3);
        let ids: Vec<&str> = results.iter().map(|r| r.custom_id.as_str()).collect();
        assert_eq!(ids, vec!["request-0", "request-1", "request-2"]);

        assert_eq!(results[0].output, Some(Label { label: "a".into() }));
        assert_eq!(results[1].outcome, BatchOutcome::Errored);
        assert_eq!(kind(&results[1]), Some(ERR_MISSING_RESULT));
        assert!(results[1].output.is_none());
        assert!(results[2].is_success());
    }

    #[test]
    fn outcome_round_trips_unknown_types() {
        assert_eq!(BatchOutcome::from_type("expired"), BatchOutcome::Expired);
        let odd = BatchOutcome::from_type("paused");
        assert_eq!(odd.as_str(), "paused");
        assert_eq!(serde_json::to_value(&odd).unwrap(), "paused");
    }
}
