//! Transport-only chat-completion client primitives.
//!
//! This crate owns request building, response parsing, and incremental SSE
//! decoding for OpenAI-compatible `/chat/completions` endpoints. It
//! intentionally contains no conversation state and no UI coupling.
//!
//! Streaming is exposed as a pull sequence: [`client::CompletionStream`]
//! yields text deltas one at a time, layered on the line-oriented
//! [`sse::FrameDecoder`], which is correct under arbitrary chunk boundaries
//! (a frame, the `[DONE]` sentinel, or a multi-byte UTF-8 scalar may be split
//! anywhere).

pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod payload;
pub mod sse;
pub mod url;

pub use client::CancellationSignal;
pub use client::ChatClient;
pub use client::CompletionStream;
pub use config::ChatApiConfig;
pub use error::ChatApiError;
pub use payload::{ChatMessage, ChatRequest, Role};
pub use sse::{FrameDecoder, StreamFrame};
pub use url::normalize_chat_url;
