//! HTTP tests for the OpenAI-compatible generator against a mock server

use futures::StreamExt;
use mockito::{Matcher, Server};
use secrecy::SecretString;
use serde_json::json;
use smart_summary::generation::{
    GenerationConfig, GenerationError, GenerationRequest, OpenAiCompatibleGenerator, TextGenerator,
};
use tokio_util::sync::CancellationToken;

const PATH: &str = "/v1/chat/completions";

fn generator(server: &Server) -> OpenAiCompatibleGenerator {
    let config = GenerationConfig {
        endpoint: format!("{}{PATH}", server.url()),
        api_key: Some(SecretString::new("test-key".to_string())),
        retry_backoff_ms: 1,
        timeout_secs: 5,
        ..Default::default()
    };
    OpenAiCompatibleGenerator::new(config).unwrap()
}

fn request() -> GenerationRequest {
    GenerationRequest::new("Summarize: the meeting moved to Friday.")
        .with_system("Use at most 50 words.")
}

fn sse(fragments: &[&str]) -> String {
    let mut body = String::from(": keep-alive\n\n");
    body.push_str("data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n");
    for fragment in fragments {
        let chunk = json!({ "choices": [{ "delta": { "content": fragment } }] });
        body.push_str(&format!("data: {chunk}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

#[tokio::test]
async fn streams_fragments_in_order() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::PartialJson(json!({ "stream": true })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(sse(&["The meeting ", "moved to ", "Friday."]))
        .expect(1)
        .create_async()
        .await;

    let stream = generator(&server)
        .generate_stream(request(), CancellationToken::new())
        .await
        .unwrap();
    let fragments: Vec<String> = stream.map(|f| f.unwrap()).collect().await;

    assert_eq!(fragments, vec!["The meeting ", "moved to ", "Friday."]);
    mock.assert_async().await;
}

#[tokio::test]
async fn non_streaming_call_returns_first_choice() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .match_body(Matcher::PartialJson(json!({
            "stream": false,
            "messages": [
                { "role": "system", "content": "Use at most 50 words." },
                { "role": "user", "content": "Summarize: the meeting moved to Friday." }
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "choices": [{
                    "message": { "role": "assistant", "content": "Meeting moved to Friday." }
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let summary = generator(&server)
        .generate(request(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary, "Meeting moved to Friday.");
    mock.assert_async().await;
}

#[tokio::test]
async fn server_errors_are_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .with_status(503)
        .with_body("overloaded")
        .expect(3)
        .create_async()
        .await;

    let result = generator(&server)
        .generate(request(), CancellationToken::new())
        .await;

    assert!(matches!(result, Err(GenerationError::Api { status: 503, .. })));
    mock.assert_async().await;
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .with_status(401)
        .with_body("invalid api key")
        .expect(1)
        .create_async()
        .await;

    let result = generator(&server)
        .generate_stream(request(), CancellationToken::new())
        .await;

    match result {
        Err(GenerationError::Api { status, body }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid api key");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected an API error"),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn malformed_stream_data_ends_with_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", PATH)
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Partial\"}}]}\n\n\
             data: {broken\n\n",
        )
        .create_async()
        .await;

    let stream = generator(&server)
        .generate_stream(request(), CancellationToken::new())
        .await
        .unwrap();
    let items: Vec<Result<String, GenerationError>> = stream.collect().await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap(), "Partial");
    assert!(matches!(items[1], Err(GenerationError::Malformed(_))));
}

#[tokio::test]
async fn cancelled_token_stops_the_call() {
    let server = Server::new_async().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = generator(&server).generate(request(), cancel).await;
    assert!(matches!(result, Err(GenerationError::Cancelled)));
}
