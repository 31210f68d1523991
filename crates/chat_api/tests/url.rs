use chat_api::normalize_chat_url;
use chat_api::url::DEFAULT_CHAT_BASE_URL;

#[test]
fn url_normalization_keeps_existing_completions_endpoint() {
    assert_eq!(
        normalize_chat_url("https://api.deepseek.com/chat/completions"),
        "https://api.deepseek.com/chat/completions"
    );
}

#[test]
fn url_normalization_appends_completions_to_chat_base() {
    assert_eq!(
        normalize_chat_url("https://api.deepseek.com/chat"),
        "https://api.deepseek.com/chat/completions"
    );
}

#[test]
fn url_normalization_appends_chat_completions_to_generic_base() {
    assert_eq!(
        normalize_chat_url("https://api.deepseek.com"),
        "https://api.deepseek.com/chat/completions"
    );
}

#[test]
fn url_normalization_trims_whitespace_and_trailing_slashes() {
    assert_eq!(
        normalize_chat_url("  https://example.com/v1///  "),
        "https://example.com/v1/chat/completions"
    );
}

#[test]
fn url_normalization_falls_back_to_default_base() {
    assert_eq!(
        normalize_chat_url("   "),
        format!("{DEFAULT_CHAT_BASE_URL}/chat/completions")
    );
}
