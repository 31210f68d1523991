use chat_api::ChatMessage;

use crate::schema::SessionEntryKind;
use crate::store::SessionStore;

impl SessionStore {
    /// Rebuild the conversation from the transcript, in append order.
    /// File-write records are bookkeeping and do not become messages.
    #[must_use]
    pub fn replay(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::new();
        for entry in &self.entries {
            match &entry.kind {
                SessionEntryKind::UserText { text } => {
                    messages.push(ChatMessage::user(text.clone()));
                }
                SessionEntryKind::AssistantText { text } => {
                    messages.push(ChatMessage::assistant(text.clone()));
                }
                SessionEntryKind::FileWrite { .. } => {}
            }
        }
        messages
    }
}
