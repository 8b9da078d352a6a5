//! Gemini backend against a local mock server

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tutor_gate::services::generation::{
    BackendError, GeminiBackend, GenerateRequest, GenerationError, GenerationOutcome,
    GenerativeBackend, GroundingSource, InlineImage, ResilientClient, RetryPolicy,
};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL_PATH: &str = "/v1beta/models/gemini-test:generateContent";
const KEY: &str = "test-key-123";

fn backend(server: &MockServer) -> GeminiBackend {
    GeminiBackend::new(
        format!("{}{}", server.uri(), MODEL_PATH),
        KEY,
        Duration::from_secs(5),
    )
    .unwrap()
}

fn request() -> GenerateRequest {
    GenerateRequest {
        system_instruction: "You are a patient tutor.".into(),
        image: None,
        prompt: Some("Factor x^2 - 1".into()),
    }
}

#[tokio::test]
async fn test_request_shape_and_answer_parsing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(query_param("key", KEY))
        .and(body_partial_json(json!({
            "contents": [{ "parts": [{ "text": "Factor x^2 - 1" }] }],
            "tools": [{ "google_search": {} }],
            "systemInstruction": { "parts": [{ "text": "You are a patient tutor." }] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "(x - 1)(x + 1)" }], "role": "model" },
                "finishReason": "STOP",
                "groundingMetadata": {
                    "groundingChunks": [
                        { "web": { "uri": "https://algebra.example/diff", "title": "Difference of squares" } },
                        { "web": { "uri": "https://algebra.example/diff", "title": "Duplicate" } },
                        { "web": { "uri": "https://untitled.example", "title": "  " } }
                    ]
                }
            }],
            "usageMetadata": { "totalTokenCount": 42 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = backend(&server).generate(&request()).await.unwrap().into_outcome();

    assert_eq!(
        outcome,
        GenerationOutcome::Answered {
            text: "(x - 1)(x + 1)".into(),
            sources: vec![GroundingSource {
                uri: "https://algebra.example/diff".into(),
                title: "Difference of squares".into(),
            }],
        }
    );
}

#[tokio::test]
async fn test_image_sent_before_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "contents": [{ "parts": [
                { "inlineData": { "mimeType": "image/jpeg", "data": "/9j/" } },
                { "text": "What is this?" }
            ] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let response = backend(&server)
        .generate(&GenerateRequest {
            system_instruction: "s".into(),
            image: Some(InlineImage {
                mime_type: "image/jpeg".into(),
                data: vec![0xFF, 0xD8, 0xFF],
            }),
            prompt: Some("What is this?".into()),
        })
        .await
        .unwrap();

    assert_eq!(response.into_outcome(), GenerationOutcome::NoAnswer);
}

#[tokio::test]
async fn test_error_status_keeps_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let err = backend(&server).generate(&request()).await.unwrap_err();

    match err {
        BackendError::Http { status, body } => {
            assert_eq!(status, 429);
            assert_eq!(body, "quota exceeded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_non_json_success_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = backend(&server).generate(&request()).await.unwrap_err();

    assert!(matches!(err, BackendError::Decode(_)));
}

#[tokio::test]
async fn test_refused_connection_is_network_error() {
    let err = GeminiBackend::new(
        format!("http://127.0.0.1:1{}", MODEL_PATH),
        KEY,
        Duration::from_secs(2),
    )
    .unwrap()
    .generate(&request())
    .await
    .unwrap_err();

    assert!(matches!(err, BackendError::Network(_)));
}

#[tokio::test]
async fn test_resilient_client_retries_unavailable_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "done" }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ResilientClient::new(Arc::new(backend(&server)), RetryPolicy::new(3, Duration::ZERO));
    let outcome = client.generate(&request()).await.unwrap();

    assert_eq!(
        outcome,
        GenerationOutcome::Answered {
            text: "done".into(),
            sources: vec![]
        }
    );
}

#[tokio::test]
async fn test_resilient_client_stops_on_invalid_argument() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "Invalid JSON payload received.",
                "status": "INVALID_ARGUMENT"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ResilientClient::new(Arc::new(backend(&server)), RetryPolicy::new(3, Duration::ZERO));
    let err = client.generate(&request()).await.unwrap_err();

    assert!(matches!(err, GenerationError::BadRequest { status: 400, .. }));
}

#[tokio::test]
async fn test_resilient_client_reports_unexpected_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ResilientClient::new(Arc::new(backend(&server)), RetryPolicy::new(3, Duration::ZERO));
    let err = client.generate(&request()).await.unwrap_err();

    assert_eq!(err.kind(), "unexpected_response");
}
