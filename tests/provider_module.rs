mod support;

use sandflow::capability::{
    ChatMessage, ChatRequest, EmbeddingService, HttpClient, LlmService, UreqHttpClient,
};
use sandflow::provider::{
    AnthropicProvider, OpenAiCompatibleProvider, ProviderError, ProviderRouter,
};
use sandflow::shared::Deadline;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use support::MockHttpServer;

fn http() -> Arc<dyn HttpClient> {
    Arc::new(UreqHttpClient::new(Duration::from_secs(5), "sandflow-test"))
}

fn chat_request() -> ChatRequest {
    ChatRequest {
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: "What is the weather?".to_string(),
        }],
        system: Some("Be brief.".to_string()),
        temperature: Some(0.2),
        max_tokens: None,
        tools: vec![json!({"name": "lookup_weather"})],
    }
}

#[test]
fn openai_embeddings_are_returned_in_input_order() {
    let server = MockHttpServer::start(1, |_| {
        (
            200,
            json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 0.0]}
                ],
                "model": "text-embedding-3-small",
                "usage": {"prompt_tokens": 4, "total_tokens": 4}
            })
            .to_string(),
        )
    });
    let provider = OpenAiCompatibleProvider::new(
        "local",
        http(),
        format!("{}/v1/", server.base_url),
        Some("sk-test".to_string()),
    );
    let response = provider
        .embed(
            &Deadline::none(),
            "text-embedding-3-small",
            &["first".to_string(), "second".to_string()],
        )
        .expect("embed");
    assert_eq!(response.vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    assert_eq!(response.dimension, 2);
    assert_eq!(response.usage.total_tokens, 4);

    let requests = server.finish();
    assert_eq!(requests[0].path, "/v1/embeddings");
    assert_eq!(requests[0].header("authorization"), Some("Bearer sk-test"));
    let body: Value = serde_json::from_str(&requests[0].body).expect("json body");
    assert_eq!(body["input"], json!(["first", "second"]));
}

#[test]
fn openai_chat_maps_content_tool_calls_and_usage() {
    let server = MockHttpServer::start(1, |_| {
        (
            200,
            json!({
                "choices": [{
                    "message": {
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {"name": "lookup_weather", "arguments": "{\"city\":\"Oslo\"}"}
                        }]
                    },
                    "finish_reason": "tool_calls"
                }],
                "usage": {"prompt_tokens": 12, "completion_tokens": 7}
            })
            .to_string(),
        )
    });
    let provider = OpenAiCompatibleProvider::new("local", http(), &server.base_url, None);
    let response = provider
        .chat(&Deadline::none(), "gpt-4o-mini", &chat_request())
        .expect("chat");
    assert_eq!(response.content, "");
    assert_eq!(response.finish_reason.as_deref(), Some("tool_calls"));
    let calls = response.tool_calls.expect("tool calls");
    assert_eq!(calls[0].name, "lookup_weather");
    assert_eq!(calls[0].arguments, json!({"city": "Oslo"}));
    assert_eq!(response.usage.input_tokens, 12);
    assert_eq!(response.usage.output_tokens, 7);

    let requests = server.finish();
    assert_eq!(requests[0].path, "/chat/completions");
    assert!(requests[0].header("authorization").is_none());
    let body: Value = serde_json::from_str(&requests[0].body).expect("json body");
    assert_eq!(body["messages"][0], json!({"role": "system", "content": "Be brief."}));
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["tools"][0]["name"], "lookup_weather");
    assert!(body.get("max_tokens").is_none());
}

#[test]
fn anthropic_messages_request_and_response_shape() {
    let server = MockHttpServer::start(1, |_| {
        (
            200,
            json!({
                "content": [
                    {"type": "text", "text": "Checking."},
                    {"type": "tool_use", "id": "tu_1", "name": "lookup_weather", "input": {"city": "Oslo"}}
                ],
                "stop_reason": "tool_use",
                "usage": {"input_tokens": 20, "output_tokens": 9}
            })
            .to_string(),
        )
    });
    let provider = AnthropicProvider::new(http(), &server.base_url, "ak-test", "2023-06-01", 512);
    let response = provider
        .chat(&Deadline::none(), "claude-test", &chat_request())
        .expect("chat");
    assert_eq!(response.content, "Checking.");
    assert_eq!(response.finish_reason.as_deref(), Some("tool_use"));
    assert_eq!(
        response.tool_calls.expect("tool calls")[0].arguments,
        json!({"city": "Oslo"})
    );
    assert_eq!(response.usage.input_tokens, 20);

    let requests = server.finish();
    let request = &requests[0];
    assert_eq!(request.path, "/v1/messages");
    assert_eq!(request.header("x-api-key"), Some("ak-test"));
    assert_eq!(request.header("anthropic-version"), Some("2023-06-01"));
    let body: Value = serde_json::from_str(&request.body).expect("json body");
    assert_eq!(body["max_tokens"], 512);
    assert_eq!(body["system"], "Be brief.");
    assert_eq!(body["messages"][0]["content"], "What is the weather?");
}

#[test]
fn error_statuses_surface_provider_and_body() {
    let server = MockHttpServer::start(1, |_| {
        (401, r#"{"error":{"message":"invalid api key"}}"#.to_string())
    });
    let provider = AnthropicProvider::new(http(), &server.base_url, "bad", "2023-06-01", 256);
    let err = provider
        .chat(&Deadline::none(), "claude-test", &chat_request())
        .expect_err("401");
    let ProviderError::Status { status, body, .. } = &err else {
        panic!("expected status error, got {err:?}");
    };
    assert_eq!(*status, 401);
    assert!(body.contains("invalid api key"));
    server.finish();
}

#[test]
fn router_dispatches_by_provider_name() {
    let server = MockHttpServer::start(1, |_| {
        (
            200,
            json!({"data": [{"index": 0, "embedding": [0.5, 0.5, 0.0]}]}).to_string(),
        )
    });
    let router = ProviderRouter::new()
        .with_openai_compatible(
            "local",
            OpenAiCompatibleProvider::new("local", http(), &server.base_url, None),
        )
        .with_anthropic(
            "anthropic",
            AnthropicProvider::new(http(), "http://127.0.0.1:9", "k", "2023-06-01", 256),
        );
    assert_eq!(router.provider_names(), vec!["anthropic", "local"]);

    let embedder: &dyn EmbeddingService = &router;
    let response = embedder
        .embed(&Deadline::none(), "local", "nomic", &["hi".to_string()])
        .expect("embed through router");
    assert_eq!(response.dimension, 3);
    assert_eq!(response.model, "nomic");
    server.finish();

    let err = router
        .embed(&Deadline::none(), "anthropic", "any", &["hi".to_string()])
        .expect_err("anthropic has no embeddings");
    assert!(matches!(err, ProviderError::Unsupported { .. }));

    let llm: &dyn LlmService = &router;
    let err = llm
        .chat(&Deadline::none(), "missing", "m", &chat_request())
        .expect_err("unknown provider");
    assert!(err.to_string().contains("unknown provider"));
}
