use std::time::Duration;

use crate::url::DEFAULT_CHAT_BASE_URL;

/// Transport configuration for chat-completion requests.
#[derive(Debug, Clone)]
pub struct ChatApiConfig {
    /// Optional bearer key passed to `Authorization`. Requests go out
    /// unauthenticated when unset.
    pub api_key: Option<String>,
    /// Base URL for the completion endpoint.
    pub base_url: String,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
    /// Optional total-request timeout (connect through full body drain).
    pub timeout: Option<Duration>,
}

impl Default for ChatApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_CHAT_BASE_URL.to_string(),
            user_agent: None,
            timeout: None,
        }
    }
}

impl ChatApiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
