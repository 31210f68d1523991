//! Per-turn orchestration: one user submission driven to a committed or
//! rolled-back conversation state.
//!
//! The orchestrator owns the conversation, the code-block extractor, and the
//! optional transcript store. It talks to the network only through the
//! [`ChatBackend`] seam and to the screen only through [`DisplaySink`], so a
//! full turn is drivable from a scripted backend in tests.

use chat_api::{CancellationSignal, ChatApiError, ChatMessage, ChatRequest, Role};
use code_blocks::{BlockEvent, CodeBlockExtractor, FileInstruction};
use session_store::{SessionEntryKind, SessionStore};
use tracing::warn;

use crate::config::AssistantConfig;
use crate::conversation::Conversation;

/// Transport seam between the session loop and the completion API.
pub trait ChatBackend {
    /// Open a streaming completion for `request`.
    fn begin_stream(
        &self,
        request: ChatRequest,
        cancellation: CancellationSignal,
    ) -> Result<Box<dyn DeltaStream>, ChatApiError>;

    /// Run `request` to completion and return the full assistant text.
    fn complete(
        &self,
        request: ChatRequest,
        cancellation: CancellationSignal,
    ) -> Result<String, ChatApiError>;
}

/// One in-flight streaming response, pulled delta by delta.
pub trait DeltaStream {
    /// The next text delta, or `None` once the response has finished cleanly.
    fn next_delta(&mut self) -> Result<Option<String>, ChatApiError>;
}

/// Where display text goes while a response streams.
pub trait DisplaySink {
    fn show(&mut self, text: &str);
}

/// Where the current turn stands, observable between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Sending,
    Streaming,
    Committed,
    RolledBack,
}

/// A committed turn: the full assistant text plus the file instructions
/// extracted from it, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub assistant_text: String,
    pub instructions: Vec<FileInstruction>,
}

pub struct Session<B> {
    backend: B,
    config: AssistantConfig,
    conversation: Conversation,
    extractor: CodeBlockExtractor,
    store: Option<SessionStore>,
    phase: TurnPhase,
    last_user_text: Option<String>,
}

impl<B: ChatBackend> Session<B> {
    pub fn new(backend: B, config: AssistantConfig, store: Option<SessionStore>) -> Self {
        let conversation = Conversation::new(config.system_prompt());
        Self {
            backend,
            config,
            conversation,
            extractor: CodeBlockExtractor::new(),
            store,
            phase: TurnPhase::Idle,
            last_user_text: None,
        }
    }

    /// Seed the conversation from a replayed transcript.
    ///
    /// System messages are skipped; the seeded prompt already holds that slot.
    pub fn resume_history(&mut self, history: Vec<ChatMessage>) {
        for message in history {
            match message.role {
                Role::User => self.conversation.append_user(message.content),
                Role::Assistant => self.conversation.commit_assistant(message.content),
                Role::System => {}
            }
        }
    }

    /// Drive one full turn for `text`.
    ///
    /// On success the assistant reply is committed and the turn is persisted;
    /// on any failure the submitted user message is rolled back and the
    /// conversation is exactly as it was before the call. Display text
    /// already shown stays shown either way.
    pub fn submit(
        &mut self,
        text: &str,
        sink: &mut dyn DisplaySink,
        cancellation: CancellationSignal,
    ) -> Result<TurnOutcome, ChatApiError> {
        self.last_user_text = Some(text.to_string());
        self.phase = TurnPhase::Sending;
        self.conversation.append_user(text);

        let request = self.build_request();
        let result = if self.config.stream {
            self.drive_stream(request, sink, cancellation)
        } else {
            self.drive_complete(request, sink, cancellation)
        };

        match result {
            Ok(outcome) => {
                self.conversation
                    .commit_assistant(outcome.assistant_text.clone());
                self.phase = TurnPhase::Committed;
                self.persist_turn(text, &outcome);
                Ok(outcome)
            }
            Err(error) => {
                self.conversation.rollback_user(text);
                self.extractor.reset();
                self.phase = TurnPhase::RolledBack;
                Err(error)
            }
        }
    }

    /// Re-submit the most recent user text, whether or not it committed.
    ///
    /// Returns `None` when nothing has been submitted yet.
    pub fn retry(
        &mut self,
        sink: &mut dyn DisplaySink,
        cancellation: CancellationSignal,
    ) -> Option<Result<TurnOutcome, ChatApiError>> {
        let text = self.last_user_text.clone()?;
        Some(self.submit(&text, sink, cancellation))
    }

    /// Reset the conversation to its system seed and drop extractor state.
    ///
    /// The transcript file keeps the history it already recorded.
    pub fn clear(&mut self) {
        self.conversation.clear();
        self.extractor.reset();
        self.last_user_text = None;
        self.phase = TurnPhase::Idle;
    }

    /// Record a file the apply flow wrote. Best-effort, like turn persistence.
    pub fn record_file_write(&mut self, path: &str, language: &str) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        let kind = SessionEntryKind::FileWrite {
            path: path.to_string(),
            language: language.to_string(),
        };
        if let Err(error) = store.append(kind) {
            warn!("failed to record file write in session transcript: {error}");
        }
    }

    #[must_use]
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    #[must_use]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    #[must_use]
    pub fn last_user_text(&self) -> Option<&str> {
        self.last_user_text.as_deref()
    }

    fn build_request(&self) -> ChatRequest {
        let mut request = ChatRequest::new(
            self.config.model.clone(),
            self.conversation.messages().to_vec(),
        );
        if let Some(max_tokens) = self.config.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }
        request
    }

    fn drive_stream(
        &mut self,
        request: ChatRequest,
        sink: &mut dyn DisplaySink,
        cancellation: CancellationSignal,
    ) -> Result<TurnOutcome, ChatApiError> {
        let mut stream = self.backend.begin_stream(request, cancellation)?;
        self.phase = TurnPhase::Streaming;

        let mut assistant_text = String::new();
        let mut instructions = Vec::new();
        while let Some(delta) = stream.next_delta()? {
            assistant_text.push_str(&delta);
            for event in self.extractor.feed(&delta) {
                forward_event(event, sink, &mut instructions);
            }
        }
        // Flush only on a clean end of stream; error paths reset instead.
        for event in self.extractor.flush() {
            forward_event(event, sink, &mut instructions);
        }

        Ok(TurnOutcome {
            assistant_text,
            instructions,
        })
    }

    fn drive_complete(
        &mut self,
        request: ChatRequest,
        sink: &mut dyn DisplaySink,
        cancellation: CancellationSignal,
    ) -> Result<TurnOutcome, ChatApiError> {
        let assistant_text = self.backend.complete(request, cancellation)?;

        let mut instructions = Vec::new();
        for event in self.extractor.feed(&assistant_text) {
            forward_event(event, sink, &mut instructions);
        }
        for event in self.extractor.flush() {
            forward_event(event, sink, &mut instructions);
        }

        Ok(TurnOutcome {
            assistant_text,
            instructions,
        })
    }

    fn persist_turn(&mut self, user_text: &str, outcome: &TurnOutcome) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        let user = SessionEntryKind::UserText {
            text: user_text.to_string(),
        };
        if let Err(error) = store.append(user) {
            warn!("failed to persist user turn to session transcript: {error}");
            return;
        }
        let assistant = SessionEntryKind::AssistantText {
            text: outcome.assistant_text.clone(),
        };
        if let Err(error) = store.append(assistant) {
            warn!("failed to persist assistant turn to session transcript: {error}");
        }
    }
}

fn forward_event(
    event: BlockEvent,
    sink: &mut dyn DisplaySink,
    instructions: &mut Vec<FileInstruction>,
) {
    match event {
        BlockEvent::Text(text) => sink.show(&text),
        BlockEvent::File(instruction) => instructions.push(instruction),
    }
}
