//! Tests for [`OpenAiClient`] against a wiremock server.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vegvisir::backends::{ChatMessage, OpenAiClient, RemoteClient};
use vegvisir::{FailureKind, RouterError};

const TIMEOUT: Duration = Duration::from_secs(5);

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 12, "completion_tokens": 8, "total_tokens": 20 }
    })
}

async fn complete(
    server: &MockServer,
    timeout: Duration,
) -> vegvisir::Result<vegvisir::backends::Completion> {
    let client = OpenAiClient::with_base_url("sk-test", server.uri());
    client
        .complete(
            "gpt-3.5-turbo",
            &[ChatMessage::user("Question: What is PTO?\nAnswer:")],
            400,
            0.7,
            timeout,
        )
        .await
}

#[tokio::test]
async fn successful_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-3.5-turbo",
            "max_tokens": 400,
            "messages": [{ "role": "user", "content": "Question: What is PTO?\nAnswer:" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(" Paid time off. ")))
        .expect(1)
        .mount(&server)
        .await;

    let completion = complete(&server, TIMEOUT).await.unwrap();
    assert_eq!(completion.text, "Paid time off.");
    assert_eq!(completion.usage.total_tokens, 20);
    assert_eq!(completion.usage.prompt_tokens, 12);
}

#[tokio::test]
async fn rate_limit_with_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "7")
                .set_body_json(json!({ "error": { "message": "Rate limit reached" } })),
        )
        .mount(&server)
        .await;

    let err = complete(&server, TIMEOUT).await.unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::RateLimited);
    assert!(matches!(
        err,
        RouterError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(7)
    ));
}

#[tokio::test]
async fn server_error_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({ "error": { "message": "The server had an error" } })),
        )
        .mount(&server)
        .await;

    let err = complete(&server, TIMEOUT).await.unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::ServerError);
    assert!(matches!(
        err,
        RouterError::ServerError {
            status: 500,
            ref message,
        } if message == "The server had an error"
    ));
}

#[tokio::test]
async fn client_error_is_generic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .mount(&server)
        .await;

    let err = complete(&server, TIMEOUT).await.unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::Generic);
    assert!(matches!(
        err,
        RouterError::Api { status: 400, ref message } if message == "bad request"
    ));
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_body("too late"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let timeout = Duration::from_millis(200);
    let err = complete(&server, timeout).await.unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::Timeout);
    assert!(matches!(err, RouterError::Timeout(d) if d == timeout));
}

#[tokio::test]
async fn empty_choices_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let err = complete(&server, TIMEOUT).await.unwrap_err();
    assert!(matches!(err, RouterError::EmptyResponse));
}

#[tokio::test]
async fn blank_content_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("   ")))
        .mount(&server)
        .await;

    let err = complete(&server, TIMEOUT).await.unwrap_err();
    assert!(matches!(err, RouterError::EmptyResponse));
}

#[tokio::test]
async fn connection_refused_is_generic() {
    let client = OpenAiClient::with_base_url("sk-test", "http://127.0.0.1:1");
    let err = client
        .complete("gpt-4", &[ChatMessage::user("hi")], 16, 0.7, TIMEOUT)
        .await
        .unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::Generic);
}
