//! Committed message history for one chat session.

use chat_api::{ChatMessage, Role};

/// Ordered model-facing history, seeded with the system prompt.
///
/// Mutation goes through the turn operations only, so a failed turn can be
/// rolled back without disturbing earlier history. The system seed survives
/// `clear` and is never rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt)],
        }
    }

    /// Append the in-flight user message for the turn being submitted.
    pub fn append_user(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::user(text));
    }

    /// Finalize a turn by appending the assistant reply.
    pub fn commit_assistant(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(text));
    }

    /// Remove the trailing user message when it matches `text` exactly.
    ///
    /// Returns whether anything was removed. Used after a failed turn; a
    /// non-matching tail means the turn already committed and is left alone.
    pub fn rollback_user(&mut self, text: &str) -> bool {
        let rolled_back = self
            .messages
            .last()
            .is_some_and(|message| message.role == Role::User && message.content == text);
        if rolled_back {
            self.messages.pop();
        }
        rolled_back
    }

    /// Drop everything except the seeded system message.
    pub fn clear(&mut self) {
        self.messages.truncate(1);
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}
