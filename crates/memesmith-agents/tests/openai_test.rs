use std::sync::Arc;

use memesmith_agents::{
    ChatMessage, IdeaError, IdeaGenerator, LlmIdeaGenerator, LlmProvider, LlmRequest,
    OpenAiProvider,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "gen-123",
        "object": "chat.completion",
        "created": 1677652288,
        "model": "google/gemini-3-flash-preview",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": content,
            },
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": 120,
            "completion_tokens": 40,
            "total_tokens": 160
        }
    })
}

#[tokio::test]
async fn test_openai_completion() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Hello there!")))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new("test-key".to_string(), Some(mock_server.uri()));
    let request = LlmRequest {
        model: "gpt-4o-mini".to_string(),
        messages: vec![ChatMessage::user("Hello")],
        system: Some("You are a helpful assistant.".to_string()),
        max_tokens: None,
        temperature: None,
        json_mode: false,
    };

    let response = provider.complete(&request).await.unwrap();

    assert_eq!(response.content, "Hello there!");
    assert_eq!(response.stop_reason.as_deref(), Some("stop"));
    let usage = response.usage.expect("usage");
    assert_eq!(usage.input_tokens, 120);
    assert_eq!(usage.output_tokens, 40);
}

#[tokio::test]
async fn test_openrouter_headers_and_json_mode() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("X-Title", "Telegram Meme Generator"))
        .and(body_partial_json(json!({
            "response_format": {"type": "json_object"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{}")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new("test-key".to_string(), Some(mock_server.uri()))
        .with_provider_id("openrouter")
        .with_header("X-Title", "Telegram Meme Generator");
    assert_eq!(provider.provider_id(), "openrouter");

    let request = LlmRequest {
        model: "m".to_string(),
        messages: vec![ChatMessage::user("meme please")],
        system: None,
        max_tokens: Some(100),
        temperature: None,
        json_mode: true,
    };

    provider.complete(&request).await.unwrap();
}

#[tokio::test]
async fn test_openai_error_status_does_not_echo_key() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new("sk-secret-value".to_string(), Some(mock_server.uri()));
    let request = LlmRequest {
        model: "m".to_string(),
        messages: vec![ChatMessage::user("hi")],
        system: None,
        max_tokens: None,
        temperature: None,
        json_mode: false,
    };

    let err = provider.complete(&request).await.unwrap_err().to_string();
    assert!(err.contains("429"));
    assert!(err.contains("rate limited"));
    assert!(!err.contains("sk-secret-value"));
}

#[tokio::test]
async fn test_empty_choices_is_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "m",
            "choices": []
        })))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new("k".to_string(), Some(mock_server.uri()));
    let request = LlmRequest {
        model: "m".to_string(),
        messages: vec![],
        system: None,
        max_tokens: None,
        temperature: None,
        json_mode: false,
    };

    assert!(provider.complete(&request).await.is_err());
}

#[tokio::test]
async fn test_idea_generation_over_http() {
    let mock_server = MockServer::start().await;

    let fenced = "```json\n{\"is_memable\": true, \"top_text\": \"Monday\", \"bottom_text\": \"Again\", \"search_query\": \"tired cat\"}\n```";
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(fenced)))
        .mount(&mock_server)
        .await;

    let provider = Arc::new(OpenAiProvider::new(
        "k".to_string(),
        Some(mock_server.uri()),
    ));
    let generator = LlmIdeaGenerator::new(provider, "m");

    let idea = generator
        .generate(&["User 5: it's monday".to_string()], "it's monday", Some("anger"))
        .await
        .expect("idea");
    assert_eq!(idea.top_text, "Monday");
    assert_eq!(idea.search_query, "tired cat");
}

#[tokio::test]
async fn test_idea_generation_server_error_is_provider_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let provider = Arc::new(OpenAiProvider::new("k".to_string(), Some(mock_server.uri())));
    let generator = LlmIdeaGenerator::new(provider, "m");

    let err = generator.generate(&[], "x", None).await.unwrap_err();
    assert!(matches!(err, IdeaError::Provider(_)));
}
