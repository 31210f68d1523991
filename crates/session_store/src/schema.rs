use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRecordType {
    Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryRecordType {
    Entry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionHeader {
    #[serde(rename = "type")]
    pub record_type: SessionRecordType,
    pub version: u32,
    pub session_id: String,
    pub created_at: String,
    pub cwd: String,
}

impl SessionHeader {
    #[must_use]
    pub fn v1(
        session_id: impl Into<String>,
        created_at: impl Into<String>,
        cwd: impl Into<String>,
    ) -> Self {
        Self {
            record_type: SessionRecordType::Session,
            version: 1,
            session_id: session_id.into(),
            created_at: created_at.into(),
            cwd: cwd.into(),
        }
    }
}

// No deny_unknown_fields here: it cannot coexist with the flattened kind.
// Stray keys fall through to the kind variant, which does reject them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    #[serde(rename = "type")]
    pub record_type: EntryRecordType,
    pub id: String,
    pub parent_id: Option<String>,
    pub ts: String,
    #[serde(flatten)]
    pub kind: SessionEntryKind,
}

impl SessionEntry {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        parent_id: Option<impl Into<String>>,
        ts: impl Into<String>,
        kind: SessionEntryKind,
    ) -> Self {
        Self {
            record_type: EntryRecordType::Entry,
            id: id.into(),
            parent_id: parent_id.map(Into::into),
            ts: ts.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum SessionEntryKind {
    UserText {
        text: String,
    },
    AssistantText {
        text: String,
    },
    /// A file the assistant wrote through the apply flow. Recorded for the
    /// transcript; replay skips it, the conversation carries only text.
    FileWrite {
        path: String,
        language: String,
    },
}

/// One routed line of a transcript file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JsonLine {
    Session(SessionHeader),
    Entry(SessionEntry),
}

/// First pass over a line: read only the `type` tag, tolerating every other
/// key. The full record is then re-parsed with its strict shape.
#[derive(Debug, Clone, Copy, Deserialize)]
struct RecordProbe {
    #[serde(rename = "type")]
    record_type: RecordTag,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RecordTag {
    Session,
    Entry,
}

impl JsonLine {
    pub(crate) fn parse(line: &str) -> Result<Self, serde_json::Error> {
        let probe: RecordProbe = serde_json::from_str(line)?;
        match probe.record_type {
            RecordTag::Session => serde_json::from_str(line).map(JsonLine::Session),
            RecordTag::Entry => serde_json::from_str(line).map(JsonLine::Entry),
        }
    }
}
