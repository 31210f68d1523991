use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use tracing::debug;

use crate::config::ChatApiConfig;
use crate::error::{parse_error_message, ChatApiError};
use crate::headers::build_headers;
use crate::payload::{ChatRequest, Completion};
use crate::sse::{FrameDecoder, StreamFrame};
use crate::url::normalize_chat_url;

/// Optional cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct ChatClient {
    http: Client,
    config: ChatApiConfig,
    endpoint: String,
}

impl ChatClient {
    pub fn new(config: ChatApiConfig) -> Result<Self, ChatApiError> {
        let endpoint = normalize_chat_url(&config.base_url);
        reqwest::Url::parse(&endpoint)
            .map_err(|error| ChatApiError::InvalidEndpoint(format!("{endpoint}: {error}")))?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ChatApiError::from)?;

        Ok(Self {
            http,
            config,
            endpoint,
        })
    }

    pub fn config(&self) -> &ChatApiConfig {
        &self.config
    }

    pub fn normalized_endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn build_headers(&self, streaming: bool) -> Result<HeaderMap, ChatApiError> {
        let headers = build_headers(&self.config, streaming);
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
                    ChatApiError::InvalidEndpoint(format!("invalid header key: {key}"))
                })?,
                HeaderValue::from_str(&value).map_err(|_| {
                    ChatApiError::InvalidEndpoint(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    /// Build the outbound POST. The `stream` field on the wire is owned by
    /// the transport and always reflects `streaming`.
    pub fn build_request(
        &self,
        request: &ChatRequest,
        streaming: bool,
    ) -> Result<reqwest::RequestBuilder, ChatApiError> {
        let headers = self.build_headers(streaming)?;
        let mut payload = request.clone();
        payload.stream = Some(streaming);
        Ok(self
            .http
            .post(&self.endpoint)
            .headers(headers)
            .json(&payload))
    }

    /// Await the full completion and return the first choice's message
    /// content. An absent content field reads as an empty string.
    pub async fn complete(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<String, ChatApiError> {
        let response = self.send(request, false, cancellation).await?;
        let body = await_or_cancel(response.text(), cancellation)
            .await?
            .map_err(ChatApiError::from)?;
        let completion = serde_json::from_str::<Completion>(&body)
            .map_err(|error| ChatApiError::Protocol(format!("unrecognized completion body: {error}")))?;
        Ok(completion.first_content())
    }

    /// Begin a streaming completion and return the pull sequence of deltas.
    ///
    /// The cancellation signal is retained by the stream so every subsequent
    /// pull observes it. Dropping the stream closes the connection.
    pub async fn stream(
        &self,
        request: &ChatRequest,
        cancellation: Option<CancellationSignal>,
    ) -> Result<CompletionStream, ChatApiError> {
        let response = self.send(request, true, cancellation.as_ref()).await?;
        Ok(CompletionStream::new(response, cancellation))
    }

    async fn send(
        &self,
        request: &ChatRequest,
        streaming: bool,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, ChatApiError> {
        if is_cancelled(cancellation) {
            return Err(ChatApiError::Cancelled);
        }

        debug!(endpoint = %self.endpoint, streaming, "dispatching chat completion request");
        let response = self.build_request(request, streaming)?.send();
        let response = await_or_cancel(response, cancellation)
            .await?
            .map_err(ChatApiError::from)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = await_or_cancel(response.text(), cancellation)
            .await?
            .unwrap_or_else(|_| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        Err(ChatApiError::Status(status, parse_error_message(status, &body)))
    }
}

/// Lazy, finite, non-restartable sequence of streamed text deltas.
pub struct CompletionStream {
    bytes: BoxStream<'static, Result<Bytes, reqwest::Error>>,
    decoder: FrameDecoder,
    pending: VecDeque<String>,
    finished: bool,
    cancellation: Option<CancellationSignal>,
}

impl fmt::Debug for CompletionStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionStream")
            .field("decoder", &self.decoder)
            .field("pending", &self.pending)
            .field("finished", &self.finished)
            .field("cancellation", &self.cancellation)
            .finish_non_exhaustive()
    }
}

impl CompletionStream {
    fn new(response: Response, cancellation: Option<CancellationSignal>) -> Self {
        Self {
            bytes: response.bytes_stream().boxed(),
            decoder: FrameDecoder::default(),
            pending: VecDeque::new(),
            finished: false,
            cancellation,
        }
    }

    /// Pull the next delta.
    ///
    /// Resolves to `Ok(Some(text))` for each delta in arrival order,
    /// `Ok(None)` on clean end (sentinel seen or body closed), or `Err(_)`
    /// on transport failure, timeout expiry, or cancellation. After a clean
    /// end, later pulls keep returning `Ok(None)`; buffered deltas decoded
    /// alongside the sentinel drain before the end is reported.
    pub async fn next_delta(&mut self) -> Result<Option<String>, ChatApiError> {
        loop {
            if let Some(delta) = self.pending.pop_front() {
                return Ok(Some(delta));
            }
            if self.finished {
                return Ok(None);
            }
            if is_cancelled(self.cancellation.as_ref()) {
                self.finished = true;
                return Err(ChatApiError::Cancelled);
            }

            match await_or_cancel(self.bytes.next(), self.cancellation.as_ref()).await? {
                None => {
                    self.finished = true;
                }
                Some(Err(error)) => {
                    self.finished = true;
                    return Err(ChatApiError::from(error));
                }
                Some(Ok(chunk)) => {
                    for frame in self.decoder.feed(&chunk) {
                        match frame {
                            StreamFrame::Delta(text) => self.pending.push_back(text),
                            StreamFrame::Done => self.finished = true,
                        }
                    }
                }
            }
        }
    }
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, ChatApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(ChatApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(ChatApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
