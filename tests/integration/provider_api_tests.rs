/*!
 * Integration tests for the OpenAI-compatible provider over HTTP
 */

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sitelingo::errors::{ProviderError, TranslationError};
use sitelingo::providers::openai::OpenAI;
use sitelingo::providers::{ChatRequest, Provider};
use sitelingo::translation::TranslationClient;

use crate::common::{create_temp_dir, test_config};

const COMPLETIONS_PATH: &str = "/v1/chat/completions";

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 42, "completion_tokens": 17, "total_tokens": 59 }
    })
}

fn provider(server: &MockServer, max_retries: u32) -> OpenAI {
    OpenAI::new_with_config(
        "sk-test",
        format!("{}/v1", server.uri()),
        max_retries,
        1,
        Duration::from_secs(5),
    )
}

fn request() -> ChatRequest {
    ChatRequest::new("gpt-4o-mini", 1000)
        .temperature(0.3)
        .add_message("system", "Translate. Target locale: es")
        .add_message("user", "[0]Hello[/0]")
}

#[tokio::test]
async fn test_complete_withSuccess_shouldReturnContentAndUsage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_string_contains("\"model\":\"gpt-4o-mini\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("[0]Hola[/0]")))
        .expect(1)
        .mount(&server)
        .await;

    let response = provider(&server, 0).complete(request()).await.unwrap();

    assert_eq!(response.first_content(), Some("[0]Hola[/0]"));
    let usage = response.usage.unwrap();
    assert_eq!(usage.prompt_tokens, 42);
    assert_eq!(usage.completion_tokens, 17);
}

#[tokio::test]
async fn test_complete_withServerError_shouldRetryThenSucceed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("[0]Hola[/0]")))
        .expect(1)
        .mount(&server)
        .await;

    let response = provider(&server, 3).complete(request()).await.unwrap();
    assert_eq!(response.first_content(), Some("[0]Hola[/0]"));
}

#[tokio::test]
async fn test_complete_withRateLimit_shouldRetry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("[0]Hola[/0]")))
        .expect(1)
        .mount(&server)
        .await;

    assert!(provider(&server, 3).complete(request()).await.is_ok());
}

#[tokio::test]
async fn test_complete_withBadRequest_shouldNotRetry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("context length exceeded"))
        .expect(1)
        .mount(&server)
        .await;

    match provider(&server, 3).complete(request()).await {
        Err(ProviderError::ApiError { status_code, message }) => {
            assert_eq!(status_code, 400);
            assert!(message.contains("context length"));
        }
        other => panic!("expected a 400 API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_complete_withBadKey_shouldFailAuthentication() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .expect(1)
        .mount(&server)
        .await;

    let result = provider(&server, 3).complete(request()).await;
    assert!(matches!(result, Err(ProviderError::AuthenticationError(_))));
}

#[tokio::test]
async fn test_complete_withPersistentOutage_shouldGiveUpAfterRetries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let result = provider(&server, 2).complete(request()).await;
    assert!(matches!(result, Err(ProviderError::ApiError { status_code: 503, .. })));
}

#[tokio::test]
async fn test_translationClient_fromConfig_shouldSendPromptAndStripFence() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .and(body_string_contains("Target locale: fr"))
        .and(body_string_contains("[0]Hello[/0]"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion_body("```text\n[0]Bonjour[/0]\n```")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = create_temp_dir().unwrap();
    let mut config = test_config(dir.path());
    config.translation.endpoint = format!("{}/v1", server.uri());
    config.translation.retry_backoff_ms = 1;

    let client = TranslationClient::from_config(&config.translation, &config.site);
    let translated = client.translate("[0]Hello[/0]", "fr").await.unwrap();

    assert_eq!(translated.text, "[0]Bonjour[/0]\n");
    assert_eq!(translated.usage.prompt_tokens, 42);
}

#[tokio::test]
async fn test_translationClient_withBlankReply_shouldReportEmptyResponse() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("   ")))
        .mount(&server)
        .await;

    let dir = create_temp_dir().unwrap();
    let mut config = test_config(dir.path());
    config.translation.endpoint = format!("{}/v1", server.uri());

    let client = TranslationClient::from_config(&config.translation, &config.site);
    let result = client.translate("[0]Hello[/0]", "es").await;
    assert!(matches!(result, Err(TranslationError::EmptyResponse)));
}
