//! Durable JSONL transcripts for chat sessions.
//!
//! One file per session: a single header line, then one append-only entry
//! record per line. Opening re-validates the whole file, so a resumed
//! transcript is either fully trusted or rejected with line context.

mod error;
mod paths;
mod replay;
mod schema;
mod store;

pub use error::SessionStoreError;
pub use paths::{session_file_name, session_root};
pub use schema::{
    EntryRecordType, SessionEntry, SessionEntryKind, SessionHeader, SessionRecordType,
};
pub use store::SessionStore;
