//! Wire-level tests for the OpenAI-compatible client using wiremock.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use edubuddy::{
    ContentCategory, ContentProvider, ContentRequest, ContentSource, EduBuddy, EduBuddyError,
    GenerationOptions, Message, OpenAiClient, RetryConfig,
};

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "model": "gpt-4o-mini",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }],
        "usage": { "prompt_tokens": 12, "completion_tokens": 8, "total_tokens": 20 }
    })
}

#[tokio::test]
async fn posts_turns_with_bearer_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "max_tokens": 50,
            "messages": [{ "role": "user", "content": "hi" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("hello!")))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiClient::with_base_url("sk-test", format!("{}/v1", server.uri()));
    let result = client
        .invoke(
            &[Message::user("hi")],
            &GenerationOptions::default().max_tokens(50),
        )
        .await
        .unwrap();

    assert_eq!(result.content, "hello!");
    assert_eq!(result.model.as_deref(), Some("gpt-4o-mini"));
    assert_eq!(result.usage.unwrap().total_tokens, 20);
}

#[tokio::test]
async fn json_mode_sets_response_format() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "response_format": { "type": "json_object" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{}")))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiClient::with_base_url("k", server.uri());
    client
        .invoke(
            &[Message::user("quiz please")],
            &GenerationOptions::default().json_response(true),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn proxy_sends_no_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
        .mount(&server)
        .await;

    let client = OpenAiClient::proxy("edge", format!("{}/functions/v1/generate", server.uri()));
    client
        .invoke(&[Message::user("hi")], &GenerationOptions::default())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn status_codes_map_onto_errors() {
    let server = MockServer::start().await;
    Mock::given(path("/unauthorized/chat/completions"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(path("/limited/chat/completions"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;
    Mock::given(path("/broken/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "message": "upstream exploded", "type": "server_error" }
        })))
        .mount(&server)
        .await;

    let call = |base: &str| {
        let client = OpenAiClient::with_base_url("k", format!("{}/{base}", server.uri()));
        async move {
            client
                .invoke(&[Message::user("hi")], &GenerationOptions::default())
                .await
                .unwrap_err()
        }
    };

    assert!(matches!(call("unauthorized").await, EduBuddyError::AuthenticationFailed));
    let limited = call("limited").await;
    assert!(matches!(limited, EduBuddyError::RateLimited { .. }));
    assert_eq!(limited.retry_after(), Some(Duration::from_secs(7)));
    match call("broken").await {
        EduBuddyError::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "upstream exploded");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn blank_content_is_an_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("   ")))
        .mount(&server)
        .await;

    let client = OpenAiClient::with_base_url("k", server.uri());
    let err = client
        .invoke(&[Message::user("hi")], &GenerationOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EduBuddyError::EmptyResponse));
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = OpenAiClient::with_base_url("k", server.uri());
    let err = client
        .invoke(&[Message::user("hi")], &GenerationOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EduBuddyError::MalformedResponse(_)));
}

#[tokio::test]
async fn gateway_falls_through_to_secondary_endpoint() {
    let primary = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&primary)
        .await;

    let secondary = MockServer::start().await;
    let quiz = json!({
        "title": "Fractions quiz",
        "questions": [{
            "question": "What is half of 4?",
            "options": ["1", "2", "3", "4"],
            "correctAnswer": 1
        }]
    });
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(&quiz.to_string())))
        .expect(1)
        .mount(&secondary)
        .await;

    let gateway = EduBuddy::builder()
        .proxy("edge", format!("{}/generate", primary.uri()))
        .openai_compatible("openai", secondary.uri(), "sk-test")
        .retry(RetryConfig::disabled())
        .build()
        .unwrap();
    assert_eq!(gateway.provider_names(), vec!["edge", "openai"]);

    let response = gateway
        .request_content(
            &ContentRequest::new("Math", "Fractions", "4-6"),
            ContentCategory::Quiz,
        )
        .await
        .unwrap();

    assert_eq!(response.source, ContentSource::Fresh);
    let quiz = response.content.as_quiz().unwrap();
    assert_eq!(quiz.questions.len(), 1);
    assert_eq!(quiz.questions[0].correct_answer, 1);
}
