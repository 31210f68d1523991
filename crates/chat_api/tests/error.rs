use reqwest::StatusCode;

use chat_api::error::parse_error_message;

#[test]
fn parse_error_message_extracts_nested_message() {
    let body = r#"{"error":{"message":"invalid model","type":"invalid_request_error"}}"#;
    let message = parse_error_message(StatusCode::BAD_REQUEST, body);
    assert_eq!(message, "invalid model");
}

#[test]
fn parse_error_message_falls_back_to_raw_body() {
    let body = "raw failure text";
    let message = parse_error_message(StatusCode::INTERNAL_SERVER_ERROR, body);
    assert_eq!(message, "raw failure text");
}

#[test]
fn parse_error_message_falls_back_to_canonical_reason_on_empty_body() {
    let message = parse_error_message(StatusCode::SERVICE_UNAVAILABLE, "");
    assert_eq!(message, "Service Unavailable");
}

#[test]
fn parse_error_message_ignores_blank_nested_message() {
    let body = r#"{"error":{"message":"  "}}"#;
    let message = parse_error_message(StatusCode::BAD_REQUEST, body);
    assert_eq!(message, body);
}
