use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use chat_api::{ChatApiConfig, ChatApiError, ChatClient, ChatMessage, ChatRequest};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};

fn allow_local_integration() -> bool {
    std::env::var("CHAT_API_ALLOW_LOCAL_INTEGRATION")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

#[derive(Clone)]
struct ResponseChunk {
    delay_ms: u64,
    bytes: Vec<u8>,
}

#[derive(Clone)]
enum ScriptedResponse {
    Respond {
        status: u16,
        content_type: &'static str,
        chunks: Vec<ResponseChunk>,
    },
    /// Read the request, then go silent until the client gives up.
    Stall { delay_ms: u64 },
    /// Drop the connection without writing anything.
    Reset,
}

struct ScriptedServer {
    base_url: String,
    request_count: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    async fn new(scripts: Vec<ScriptedResponse>) -> Self {
        let scripts = Arc::new(scripts);
        let request_count = Arc::new(AtomicUsize::new(0));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("local TCP listener should bind");
        let addr = listener
            .local_addr()
            .expect("resolved local listener address");
        let base_url = format!("http://{addr}");

        let handle = tokio::spawn({
            let scripts = Arc::clone(&scripts);
            let request_count = Arc::clone(&request_count);

            async move {
                loop {
                    let (socket, _) = match listener.accept().await {
                        Ok(pair) => pair,
                        Err(_) => break,
                    };
                    let scripts = Arc::clone(&scripts);
                    let request_count = Arc::clone(&request_count);
                    tokio::spawn(async move {
                        serve_one(socket, scripts, request_count).await;
                    });
                }
            }
        });

        Self {
            base_url,
            request_count,
            handle,
        }
    }

    fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Acquire)
    }

    fn shutdown(&self) {
        self.handle.abort();
    }
}

fn response_sse(status: u16, lines: &[&str]) -> ScriptedResponse {
    ScriptedResponse::Respond {
        status,
        content_type: "text/event-stream",
        chunks: vec![ResponseChunk {
            delay_ms: 0,
            bytes: sse_lines(lines),
        }],
    }
}

fn response_json(status: u16, body: &str) -> ScriptedResponse {
    ScriptedResponse::Respond {
        status,
        content_type: "application/json",
        chunks: vec![ResponseChunk {
            delay_ms: 0,
            bytes: body.as_bytes().to_vec(),
        }],
    }
}

fn sse_lines(lines: &[&str]) -> Vec<u8> {
    let mut body = String::new();

    for line in lines {
        body.push_str("data: ");
        body.push_str(line);
        body.push('\n');
    }

    body.into_bytes()
}

fn delta_line(text: &str) -> String {
    format!("{{\"choices\":[{{\"delta\":{{\"content\":\"{text}\"}}}}]}}")
}

fn chat_request() -> ChatRequest {
    ChatRequest::new("deepseek-chat", vec![ChatMessage::user("hi")])
}

fn client_for(server: &ScriptedServer) -> ChatClient {
    let config = ChatApiConfig::new()
        .with_api_key("sk-test")
        .with_base_url(&server.base_url);
    ChatClient::new(config).expect("client")
}

async fn drain(stream: &mut chat_api::CompletionStream) -> Result<Vec<String>, ChatApiError> {
    let mut deltas = Vec::new();
    while let Some(delta) = stream.next_delta().await? {
        deltas.push(delta);
    }
    Ok(deltas)
}

#[tokio::test]
async fn stream_integration_yields_deltas_then_clean_end() {
    if !allow_local_integration() {
        return;
    }

    let delta_a = delta_line("hel");
    let delta_b = delta_line("lo");
    let server = ScriptedServer::new(vec![response_sse(
        200,
        &[&delta_a, &delta_b, "[DONE]"],
    )])
    .await;

    let client = client_for(&server);
    let mut stream = client
        .stream(&chat_request(), None)
        .await
        .expect("stream should open");

    let deltas = drain(&mut stream).await.expect("stream should drain");
    assert_eq!(deltas, vec!["hel".to_string(), "lo".to_string()]);

    // Clean end is sticky.
    assert!(matches!(stream.next_delta().await, Ok(None)));
    server.shutdown();
}

#[tokio::test]
async fn stream_integration_ignores_frames_after_done() {
    if !allow_local_integration() {
        return;
    }

    let early = delta_line("early");
    let late = delta_line("late");
    let server = ScriptedServer::new(vec![response_sse(200, &[&early, "[DONE]", &late])]).await;

    let client = client_for(&server);
    let mut stream = client
        .stream(&chat_request(), None)
        .await
        .expect("stream should open");

    let deltas = drain(&mut stream).await.expect("stream should drain");
    assert_eq!(deltas, vec!["early".to_string()]);
    server.shutdown();
}

#[tokio::test]
async fn stream_integration_survives_chunk_split_mid_frame() {
    if !allow_local_integration() {
        return;
    }

    let frame = format!("data: {}\ndata: [DONE]\n", delta_line("stitched"));
    let bytes = frame.as_bytes();
    let split = bytes.len() / 2;
    let server = ScriptedServer::new(vec![ScriptedResponse::Respond {
        status: 200,
        content_type: "text/event-stream",
        chunks: vec![
            ResponseChunk {
                delay_ms: 0,
                bytes: bytes[..split].to_vec(),
            },
            ResponseChunk {
                delay_ms: 50,
                bytes: bytes[split..].to_vec(),
            },
        ],
    }])
    .await;

    let client = client_for(&server);
    let mut stream = client
        .stream(&chat_request(), None)
        .await
        .expect("stream should open");

    let deltas = drain(&mut stream).await.expect("stream should drain");
    assert_eq!(deltas, vec!["stitched".to_string()]);
    server.shutdown();
}

#[tokio::test]
async fn stream_integration_clean_end_without_sentinel() {
    if !allow_local_integration() {
        return;
    }

    let only = delta_line("only");
    let server = ScriptedServer::new(vec![response_sse(200, &[&only])]).await;

    let client = client_for(&server);
    let mut stream = client
        .stream(&chat_request(), None)
        .await
        .expect("stream should open");

    let deltas = drain(&mut stream).await.expect("closed body is a clean end");
    assert_eq!(deltas, vec!["only".to_string()]);
    server.shutdown();
}

#[tokio::test]
async fn stream_integration_non_2xx_surfaces_status_with_parsed_message() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_json(
        400,
        r##"{"error":{"message":"invalid request"}}"##,
    )])
    .await;

    let client = client_for(&server);
    let error = client
        .stream(&chat_request(), None)
        .await
        .expect_err("stream should fail");

    assert!(
        matches!(error, ChatApiError::Status(code, ref message)
            if code.as_u16() == 400 && message == "invalid request")
    );
    assert_eq!(server.request_count(), 1);
    server.shutdown();
}

#[tokio::test]
async fn stream_integration_cancellation_mid_stream() {
    if !allow_local_integration() {
        return;
    }

    let first = delta_line("first");
    let server = ScriptedServer::new(vec![ScriptedResponse::Respond {
        status: 200,
        content_type: "text/event-stream",
        chunks: vec![
            ResponseChunk {
                delay_ms: 0,
                bytes: sse_lines(&[&first]),
            },
            ResponseChunk {
                delay_ms: 500,
                bytes: sse_lines(&["[DONE]"]),
            },
        ],
    }])
    .await;

    let client = client_for(&server);
    let cancellation = Arc::new(AtomicBool::new(false));
    let mut stream = client
        .stream(&chat_request(), Some(Arc::clone(&cancellation)))
        .await
        .expect("stream should open");

    assert_eq!(
        stream.next_delta().await.expect("first delta"),
        Some("first".to_string())
    );

    cancellation.store(true, Ordering::Release);
    let error = timeout(Duration::from_secs(2), stream.next_delta())
        .await
        .expect("cancellation should resolve promptly")
        .expect_err("cancellation should abort the stream");
    assert!(matches!(error, ChatApiError::Cancelled));
    server.shutdown();
}

#[tokio::test]
async fn stream_integration_timeout_before_first_byte() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![ScriptedResponse::Stall { delay_ms: 5_000 }]).await;

    let config = ChatApiConfig::new()
        .with_base_url(&server.base_url)
        .with_timeout(Duration::from_millis(250));
    let client = ChatClient::new(config).expect("client");

    let error = timeout(Duration::from_secs(5), client.stream(&chat_request(), None))
        .await
        .expect("timeout should resolve before the stall ends")
        .expect_err("stalled server should trip the deadline");
    assert!(matches!(error, ChatApiError::Timeout));
    server.shutdown();
}

#[tokio::test]
async fn stream_integration_connection_reset_is_transport_error() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![ScriptedResponse::Reset]).await;

    let client = client_for(&server);
    let error = client
        .stream(&chat_request(), None)
        .await
        .expect_err("reset should surface as failure");
    assert!(matches!(error, ChatApiError::Transport(_)));
    server.shutdown();
}

#[tokio::test]
async fn complete_integration_returns_first_choice_content() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_json(
        200,
        r##"{"choices":[{"message":{"role":"assistant","content":"full answer"}}]}"##,
    )])
    .await;

    let client = client_for(&server);
    let content = client
        .complete(&chat_request(), None)
        .await
        .expect("completion should succeed");
    assert_eq!(content, "full answer");
    server.shutdown();
}

#[tokio::test]
async fn complete_integration_unintelligible_body_is_protocol_error() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_json(200, "not json at all")]).await;

    let client = client_for(&server);
    let error = client
        .complete(&chat_request(), None)
        .await
        .expect_err("garbage body should fail");
    assert!(matches!(error, ChatApiError::Protocol(_)));
    server.shutdown();
}

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        429 => "Too Many Requests",
        503 => "Service Unavailable",
        _ => "Error",
    }
}

async fn serve_one(
    mut socket: TcpStream,
    scripts: Arc<Vec<ScriptedResponse>>,
    request_count: Arc<AtomicUsize>,
) {
    if read_request_headers(&mut socket).await.is_err() {
        return;
    }

    let index = request_count.fetch_add(1, Ordering::AcqRel);
    let response = scripts
        .get(index)
        .cloned()
        .unwrap_or_else(|| response_json(500, r##"{"error":"unexpected request"}"##));

    match response {
        ScriptedResponse::Reset => {}
        ScriptedResponse::Stall { delay_ms } => {
            sleep(Duration::from_millis(delay_ms)).await;
        }
        ScriptedResponse::Respond {
            status,
            content_type,
            chunks,
        } => {
            let headers = format!(
                "HTTP/1.1 {status} {}\r\nContent-Type: {}\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
                status_reason(status),
                content_type,
            );

            if socket.write_all(headers.as_bytes()).await.is_err() {
                return;
            }

            for chunk in chunks {
                if chunk.delay_ms > 0 {
                    sleep(Duration::from_millis(chunk.delay_ms)).await;
                }
                let prefix = format!("{:X}\r\n", chunk.bytes.len());
                if socket.write_all(prefix.as_bytes()).await.is_err() {
                    return;
                }
                if socket.write_all(&chunk.bytes).await.is_err() {
                    return;
                }
                if socket.write_all(b"\r\n").await.is_err() {
                    return;
                }
            }

            let _ = socket.write_all(b"0\r\n\r\n").await;
            let _ = socket.shutdown().await;
        }
    }
}

async fn read_request_headers(socket: &mut TcpStream) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buffer = [0_u8; 2048];

    loop {
        let n = socket.read(&mut buffer).await?;
        if n == 0 {
            return Ok(());
        }
        request.extend_from_slice(&buffer[..n]);
        if request.windows(4).any(|window| window == b"\r\n\r\n") {
            return Ok(());
        }
    }
}
