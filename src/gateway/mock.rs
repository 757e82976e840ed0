//! Mock gateway for testing.
//!
//! [`MockGateway`] is a queue-based fake: tests push the chat responses (or
//! errors) the model should produce and the batch state the gateway should
//! report, then assert on the recorded calls afterwards.
//!
//! ```
//! use ai_lib_structured::gateway::mock::MockGateway;
//! use ai_lib_structured::gateway::{ChatCompletionRequest, ModelGateway};
//! use ai_lib_structured::Message;
//!
//! # tokio_test::block_on(async {
//! let mock = MockGateway::new();
//! mock.queue_text(r#"{"ok": true}"#);
//!
//! let resp = mock
//!     .chat_completion(ChatCompletionRequest {
//!         model: "test".into(),
//!         system: None,
//!         think: false,
//!         messages: vec![Message::user("hi")],
//!         tools: vec![],
//!         tool_choice: None,
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(resp.first_message().unwrap().content, r#"{"ok": true}"#);
//! assert_eq!(mock.recorded_chat_calls().len(), 1);
//! # });
//! ```

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use super::{
    Batch, BatchRequestCounts, BatchResultEntry, ChatCompletionRequest, ChatCompletionResponse,
    CreateBatchRequest, ModelGateway,
};
use crate::error::TransportError;
use crate::types::{Message, ToolCall};
use crate::Result;

#[derive(Default)]
struct BatchState {
    batches: HashMap<String, Batch>,
    results: HashMap<String, Vec<BatchResultEntry>>,
    submissions: Vec<CreateBatchRequest>,
    next_id: u64,
}

/// A queue-based fake [`ModelGateway`].
///
/// Chat calls pop from the front of the response queue; an empty queue yields
/// a transport error rather than a panic. Created batches start
/// `in_progress`; use [`finish_batch`](Self::finish_batch) to end one and
/// attach results.
#[derive(Default)]
pub struct MockGateway {
    responses: Mutex<VecDeque<std::result::Result<ChatCompletionResponse, String>>>,
    chat_calls: Mutex<Vec<ChatCompletionRequest>>,
    batch: Mutex<BatchState>,
    fail_batch_calls: Mutex<Option<String>>,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_response(&self, response: ChatCompletionResponse) {
        lock(&self.responses).push_back(Ok(response));
    }

    pub fn queue_message(&self, message: Message) {
        self.queue_response(ChatCompletionResponse::from_message(message));
    }

    /// Queue a final assistant answer.
    pub fn queue_text(&self, text: impl Into<String>) {
        self.queue_message(Message::assistant(text));
    }

    /// Queue an assistant turn requesting tool calls.
    pub fn queue_tool_calls(&self, calls: Vec<ToolCall>) {
        self.queue_message(Message::assistant_tool_calls("", calls));
    }

    /// Queue a transport failure for the next chat call.
    pub fn queue_error(&self, message: impl Into<String>) {
        lock(&self.responses).push_back(Err(message.into()));
    }

    /// Make every batch call fail with a transport error.
    pub fn fail_batch_calls(&self, message: impl Into<String>) {
        *lock(&self.fail_batch_calls) = Some(message.into());
    }

    pub fn recorded_chat_calls(&self) -> Vec<ChatCompletionRequest> {
        lock(&self.chat_calls).clone()
    }

    pub fn recorded_batch_submissions(&self) -> Vec<CreateBatchRequest> {
        lock(&self.batch).submissions.clone()
    }

    pub fn pending_responses(&self) -> usize {
        lock(&self.responses).len()
    }

    /// Mark a batch as ended and set the results the gateway will report.
    ///
    /// Counts follow the distinct ids in `results`. Submitted items with no
    /// result are counted as errored, so the batch total stays the number of
    /// requests submitted.
    pub fn finish_batch(&self, batch_id: &str, results: Vec<BatchResultEntry>) {
        let mut state = lock(&self.batch);
        let mut counts = BatchRequestCounts::default();
        let mut seen = HashSet::new();
        for entry in results.iter().filter(|e| seen.insert(e.custom_id.as_str())) {
            match entry.result.result_type.as_str() {
                "succeeded" => counts.succeeded += 1,
                "errored" => counts.errored += 1,
                "canceled" => counts.canceled += 1,
                "expired" => counts.expired += 1,
                _ => {}
            }
        }
        let batch = state
            .batches
            .entry(batch_id.to_string())
            .or_insert_with(|| Batch {
                id: batch_id.to_string(),
                processing_status: String::new(),
                request_counts: BatchRequestCounts::default(),
                created_at: None,
                ended_at: None,
            });
        counts.errored += batch.request_counts.total().saturating_sub(counts.total());
        batch.processing_status = super::BATCH_STATUS_ENDED.to_string();
        batch.request_counts = counts;
        state.results.insert(batch_id.to_string(), results);
    }

    fn check_batch_failure(&self) -> Result<()> {
        match lock(&self.fail_batch_calls).as_ref() {
            Some(msg) => Err(TransportError::Other(msg.clone()).into()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ModelGateway for MockGateway {
    async fn chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        lock(&self.chat_calls).push(request);
        match lock(&self.responses).pop_front() {
            Some(Ok(resp)) => Ok(resp),
            Some(Err(msg)) => Err(TransportError::Other(msg).into()),
            None => Err(TransportError::Other("mock gateway: no queued response".into()).into()),
        }
    }

    async fn create_batch(&self, request: CreateBatchRequest) -> Result<Batch> {
        self.check_batch_failure()?;
        let mut state = lock(&self.batch);
        state.next_id += 1;
        let id = format!("batch-{}", state.next_id);
        let batch = Batch {
            id: id.clone(),
            processing_status: "in_progress".to_string(),
            request_counts: BatchRequestCounts {
                processing: request.requests.len() as u64,
                ..Default::default()
            },
            created_at: None,
            ended_at: None,
        };
        state.submissions.push(request);
        state.batches.insert(id, batch.clone());
        Ok(batch)
    }

    async fn get_batch(&self, batch_id: &str) -> Result<Batch> {
        self.check_batch_failure()?;
        lock(&self.batch)
            .batches
            .get(batch_id)
            .cloned()
            .ok_or_else(|| {
                TransportError::Status {
                    status: 404,
                    body: format!("batch {} not found", batch_id),
                }
                .into()
            })
    }

    async fn get_batch_results(&self, batch_id: &str) -> Result<Vec<BatchResultEntry>> {
        self.check_batch_failure()?;
        Ok(lock(&self.batch)
            .results
            .get(batch_id)
            .cloned()
            .unwrap_or_default())
    }
}
