//! HttpGateway against a local mock HTTP server.

use ai_lib_structured::gateway::http::INVALID_RESULT;
use ai_lib_structured::gateway::{
    BatchRequest, BatchRequestParams, ChatCompletionRequest, CreateBatchRequest, HttpGateway,
    ModelGateway,
};
use ai_lib_structured::{
    BatchOutcome, Client, Error, GatewayConfig, Message, OutputShape, StructuredRequest,
    TransportError,
};
use mockito::{Matcher, Server};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Sentiment {
    label: String,
}

impl OutputShape for Sentiment {}

fn config(base_url: &str) -> GatewayConfig {
    GatewayConfig::new(base_url).with_api_key("sk-test")
}

fn chat_request() -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: "test-model".into(),
        system: Some("be terse".into()),
        think: true,
        messages: vec![Message::system("be terse"), Message::user("hi")],
        tools: vec![],
        tool_choice: None,
    }
}

#[tokio::test]
async fn chat_completion_posts_openai_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "test-model",
            "think": true,
            "messages": [
                {"role": "system", "content": "be terse"},
                {"role": "user", "content": "hi"}
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "cmpl-1",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "{\"label\":\"positive\"}"},
                    "finish_reason": "stop"
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let gateway = HttpGateway::new(&config(&server.url())).unwrap();
    let resp = gateway.chat_completion(chat_request()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(resp.id.as_deref(), Some("cmpl-1"));
    assert_eq!(
        resp.first_message().unwrap().content,
        "{\"label\":\"positive\"}"
    );
}

#[tokio::test]
async fn tool_calls_decode_from_the_wire() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body(
            json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": "",
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {"name": "lookup", "arguments": "{\"q\":\"x\"}"}
                        }]
                    }
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let gateway = HttpGateway::new(&config(&server.url())).unwrap();
    let resp = gateway.chat_completion(chat_request()).await.unwrap();
    let message = resp.first_message().unwrap();
    assert!(message.has_tool_calls());
    assert_eq!(message.tool_calls[0].name(), "lookup");
    assert_eq!(message.tool_calls[0].function.arguments, "{\"q\":\"x\"}");
}

#[tokio::test]
async fn non_success_status_is_a_transport_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(503)
        .with_body("overloaded")
        .create_async()
        .await;

    let gateway = HttpGateway::new(&config(&server.url())).unwrap();
    let err = gateway.chat_completion(chat_request()).await.unwrap_err();
    match err {
        Error::Transport(TransportError::Status { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "overloaded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn garbage_body_is_a_decode_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body("<html>")
        .create_async()
        .await;

    let gateway = HttpGateway::new(&config(&server.url())).unwrap();
    let err = gateway.chat_completion(chat_request()).await.unwrap_err();
    assert!(matches!(err, Error::Transport(TransportError::Decode(_))));
}

#[tokio::test]
async fn batch_endpoints_round_trip() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/batches")
        .match_body(Matcher::PartialJson(json!({
            "requests": [{"custom_id": "request-0", "params": {"model": "m", "max_tokens": 4096}}]
        })))
        .with_status(200)
        .with_body(
            json!({"id": "b-1", "processing_status": "in_progress", "request_counts": {"processing": 1}})
                .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/batches/b-1")
        .with_status(200)
        .with_body(
            json!({"id": "b-1", "processing_status": "ended", "request_counts": {"succeeded": 1}})
                .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/batches/b-1/results")
        .with_status(200)
        .with_body(concat!(
            r#"{"custom_id":"request-0","result":{"type":"succeeded","message":{"content":[{"type":"text","text":"{\"label\":\"positive\"}"}]}}}"#,
            "\n\n"
        ))
        .create_async()
        .await;

    let gateway = HttpGateway::new(&config(&server.url())).unwrap();
    let batch = gateway
        .create_batch(CreateBatchRequest {
            requests: vec![BatchRequest {
                custom_id: "request-0".into(),
                params: BatchRequestParams {
                    model: "m".into(),
                    max_tokens: 4096,
                    messages: vec![Message::user("hi")],
                },
            }],
        })
        .await
        .unwrap();
    create.assert_async().await;
    assert_eq!(batch.id, "b-1");
    assert!(!batch.is_ended());

    let batch = gateway.get_batch("b-1").await.unwrap();
    assert!(batch.is_ended());

    let results = gateway.get_batch_results("b-1").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].result.result_type, "succeeded");
}

#[tokio::test]
async fn malformed_result_line_stays_with_its_item() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/batches/b-2")
        .with_status(200)
        .with_body(
            json!({"id": "b-2", "processing_status": "ended", "request_counts": {"succeeded": 2}})
                .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/batches/b-2/results")
        .with_status(200)
        .with_body(concat!(
            r#"{"custom_id":"request-0","result":{"type":"succeeded","message":{"content":[{"type":"text","text":"{\"label\":\"positive\"}"}]}}}"#,
            "\n",
            r#"{"custom_id":"request-1","result":{"message":"unexpected"}}"#,
            "\n"
        ))
        .create_async()
        .await;

    let client = Client::from_config(&config(&server.url())).unwrap();
    let results = client
        .batch_results::<Sentiment>("b-2")
        .await
        .unwrap()
        .results
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_success());
    assert_eq!(results[1].custom_id, "request-1");
    assert_eq!(results[1].outcome, BatchOutcome::Errored);
    assert_eq!(
        results[1].error.as_ref().map(|e| e.error_type.as_str()),
        Some(INVALID_RESULT)
    );
}

#[tokio::test]
async fn result_line_without_an_id_fails_the_read() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/batches/b-3/results")
        .with_status(200)
        .with_body("{\"result\": 1}\n")
        .create_async()
        .await;

    let gateway = HttpGateway::new(&config(&server.url())).unwrap();
    let err = gateway.get_batch_results("b-3").await.unwrap_err();
    assert!(matches!(err, Error::Transport(TransportError::Decode(_))));
}

#[tokio::test]
async fn client_over_http_end_to_end() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body(
            json!({
                "choices": [{
                    "message": {"role": "assistant", "content": "Easy.\n{\"label\":\"positive\"}"}
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = Client::from_config(&config(&server.url())).unwrap();
    let req = StructuredRequest::<Sentiment>::new("test-model", "classify sentiment")
        .context("I love this");
    let resp = client.call_structured(&req).await.unwrap();
    assert_eq!(resp.output.label, "positive");
    assert_eq!(resp.model_comment, "Easy.");
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let err = HttpGateway::new(&GatewayConfig::new("::not a url::")).unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
}
