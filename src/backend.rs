//! HTTP backend bridging the synchronous session loop onto the async
//! transport client with a current-thread tokio runtime.

use std::io;
use std::sync::Arc;

use chat_api::{CancellationSignal, ChatApiError, ChatClient, ChatRequest, CompletionStream};
use tokio::runtime::Runtime;

use crate::session::{ChatBackend, DeltaStream};

/// [`ChatBackend`] over a real [`ChatClient`], one `block_on` per pull.
pub struct HttpChatBackend {
    client: ChatClient,
    runtime: Arc<Runtime>,
}

impl HttpChatBackend {
    /// The runtime is built once and shared with every stream handed out;
    /// in-flight response bodies stay registered with its reactor between
    /// pulls.
    pub fn new(client: ChatClient) -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            client,
            runtime: Arc::new(runtime),
        })
    }
}

impl ChatBackend for HttpChatBackend {
    fn begin_stream(
        &self,
        request: ChatRequest,
        cancellation: CancellationSignal,
    ) -> Result<Box<dyn DeltaStream>, ChatApiError> {
        let stream = self
            .runtime
            .block_on(self.client.stream(&request, Some(cancellation)))?;

        Ok(Box::new(HttpDeltaStream {
            runtime: Arc::clone(&self.runtime),
            stream,
        }))
    }

    fn complete(
        &self,
        request: ChatRequest,
        cancellation: CancellationSignal,
    ) -> Result<String, ChatApiError> {
        self.runtime
            .block_on(self.client.complete(&request, Some(&cancellation)))
    }
}

struct HttpDeltaStream {
    runtime: Arc<Runtime>,
    stream: CompletionStream,
}

impl DeltaStream for HttpDeltaStream {
    fn next_delta(&mut self) -> Result<Option<String>, ChatApiError> {
        self.runtime.block_on(self.stream.next_delta())
    }
}
