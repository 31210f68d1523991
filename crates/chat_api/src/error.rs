use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;

#[derive(Debug)]
pub enum ChatApiError {
    /// Configuration-time URL or header failure.
    InvalidEndpoint(String),
    /// Connection-level failure below HTTP semantics.
    Transport(reqwest::Error),
    /// Non-2xx response; carries the status and the parsed body message.
    Status(StatusCode, String),
    /// Payload shape the client cannot understand at all.
    Protocol(String),
    /// The exchange exceeded the configured total-request timeout.
    Timeout,
    /// Explicit caller abort via the cancellation signal.
    Cancelled,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayload {
    #[serde(rename = "error")]
    pub value: Option<ErrorPayloadFields>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayloadFields {
    pub message: Option<String>,
}

impl ErrorPayloadFields {
    pub fn nonempty_message(&self) -> Option<String> {
        let message = self.message.as_deref()?.trim();
        if message.is_empty() {
            None
        } else {
            Some(message.to_owned())
        }
    }
}

impl fmt::Display for ChatApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEndpoint(value) => write!(f, "invalid endpoint: {value}"),
            Self::Transport(error) => write!(f, "request error: {error}"),
            Self::Status(status, message) => write!(f, "HTTP {status} {message}"),
            Self::Protocol(message) => write!(f, "protocol error: {message}"),
            Self::Timeout => write!(f, "request timed out"),
            Self::Cancelled => write!(f, "request was cancelled"),
        }
    }
}

impl std::error::Error for ChatApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(error) => Some(error),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ChatApiError {
    fn from(error: reqwest::Error) -> Self {
        // reqwest reports total-timeout expiry as a request error; keep the
        // taxonomy distinct so callers can tell a deadline from a dead peer.
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(error)
        }
    }
}

/// Extract a human-readable message from an error response body.
///
/// Understands the `{"error": {"message": ...}}` shape; falls back to the raw
/// body, then to the status line's canonical reason.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorPayload>(body) {
        if let Some(message) = payload.value.and_then(|error| error.nonempty_message()) {
            return message;
        }
    }

    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}
