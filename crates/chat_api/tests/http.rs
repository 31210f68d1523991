use chat_api::{normalize_chat_url, ChatApiConfig, ChatApiError, ChatClient, ChatMessage, ChatRequest};
use serde_json::Value;

#[test]
fn http_request_builds_completions_endpoint() {
    let config = ChatApiConfig::new()
        .with_api_key("sk-key")
        .with_base_url("https://api.deepseek.com");
    let client = ChatClient::new(config).expect("client");
    let request = ChatRequest::new("deepseek-chat", vec![ChatMessage::user("payload")]);

    let http_request = client
        .build_request(&request, true)
        .expect("build request")
        .build()
        .expect("request");

    assert_eq!(
        http_request.url().as_str(),
        normalize_chat_url("https://api.deepseek.com")
    );
    assert_eq!(http_request.method(), "POST");
    assert_eq!(
        http_request
            .headers()
            .get("authorization")
            .expect("authorization header"),
        "Bearer sk-key"
    );
}

#[test]
fn http_request_stream_flag_is_transport_owned() {
    let client = ChatClient::new(ChatApiConfig::new()).expect("client");
    let request = ChatRequest::new("deepseek-chat", vec![ChatMessage::user("payload")]);

    let streaming = client
        .build_request(&request, true)
        .expect("build request")
        .build()
        .expect("request");
    assert_eq!(request_body_json(&streaming)["stream"], Value::Bool(true));

    let buffered = client
        .build_request(&request, false)
        .expect("build request")
        .build()
        .expect("request");
    assert_eq!(request_body_json(&buffered)["stream"], Value::Bool(false));
}

#[test]
fn http_request_carries_full_message_history() {
    let client = ChatClient::new(ChatApiConfig::new()).expect("client");
    let request = ChatRequest::new(
        "deepseek-chat",
        vec![
            ChatMessage::system("sys"),
            ChatMessage::user("one"),
            ChatMessage::assistant("two"),
            ChatMessage::user("three"),
        ],
    );

    let http_request = client
        .build_request(&request, true)
        .expect("build request")
        .build()
        .expect("request");
    let body = request_body_json(&http_request);

    let messages = body["messages"].as_array().expect("messages array");
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[3]["content"], "three");
}

#[test]
fn client_rejects_unparseable_endpoint() {
    let config = ChatApiConfig::new().with_base_url("not a url");
    let error = ChatClient::new(config).expect_err("endpoint should fail validation");
    assert!(matches!(error, ChatApiError::InvalidEndpoint(_)));
}

fn request_body_json(request: &reqwest::Request) -> Value {
    let body = request
        .body()
        .expect("request should carry JSON body")
        .as_bytes()
        .expect("JSON body should be buffered bytes");
    serde_json::from_slice::<Value>(body).expect("request body should be valid JSON")
}
