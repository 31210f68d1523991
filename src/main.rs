use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chat_api::{CancellationSignal, ChatApiConfig, ChatClient, ChatMessage};
use chat_assistant::apply::FileApplier;
use chat_assistant::backend::HttpChatBackend;
use chat_assistant::config::{AssistantConfig, SESSION_ENV_VAR};
use chat_assistant::repl::Repl;
use chat_assistant::session::Session;
use session_store::SessionStore;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> io::Result<()> {
    // Logs go to stderr; stdout belongs to the streamed conversation.
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let config = AssistantConfig::load().map_err(io::Error::other)?;
    let cwd = std::env::current_dir().map_err(io::Error::other)?;

    let cancel: CancellationSignal = Arc::new(AtomicBool::new(false));
    let _ = signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&cancel))?;

    let mut api = ChatApiConfig::new().with_base_url(config.endpoint.clone());
    if let Some(api_key) = config.api_key.clone() {
        api = api.with_api_key(api_key);
    }
    if let Some(timeout) = config.timeout() {
        api = api.with_timeout(timeout);
    }
    let client = ChatClient::new(api).map_err(io::Error::other)?;
    let backend = HttpChatBackend::new(client)?;

    let (store, history) = open_or_create_store(&cwd)?;
    tracing::debug!("session transcript at {}", store.path().display());

    let mut session = Session::new(backend, config, Some(store));
    if !history.is_empty() {
        session.resume_history(history);
    }

    let applier = FileApplier::new(&cwd).map_err(io::Error::other)?;
    let mut repl = Repl::new(session, applier, cancel, cwd)?;
    repl.run()
}

/// Resume the transcript named by `CHAT_ASSISTANT_SESSION`, or start a fresh
/// one under the working directory. Resuming replays the recorded turns so
/// the conversation picks up where it left off.
fn open_or_create_store(cwd: &Path) -> io::Result<(SessionStore, Vec<ChatMessage>)> {
    match std::env::var(SESSION_ENV_VAR) {
        Ok(path) if !path.trim().is_empty() => {
            let store = SessionStore::open(&PathBuf::from(path)).map_err(io::Error::other)?;
            let history = store.replay();
            Ok((store, history))
        }
        _ => {
            let store = SessionStore::create_new(cwd).map_err(io::Error::other)?;
            Ok((store, Vec::new()))
        }
    }
}
