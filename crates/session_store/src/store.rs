use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::SessionStoreError;
use crate::paths::{session_file_name, session_root};
use crate::schema::{JsonLine, SessionEntry, SessionEntryKind, SessionHeader};

/// Append-only JSONL transcript of one chat session: a header line followed
/// by one entry record per line.
pub struct SessionStore {
    pub(crate) path: PathBuf,
    pub(crate) file: File,
    pub(crate) header: SessionHeader,
    pub(crate) entries: Vec<SessionEntry>,
    pub(crate) current_leaf_id: Option<String>,
}

impl SessionStore {
    /// Start a fresh transcript under `<cwd>/.chat_assistant/sessions/`,
    /// creating the directory if needed and writing the header line.
    pub fn create_new(cwd: &Path) -> Result<Self, SessionStoreError> {
        if !cwd.is_absolute() {
            return Err(SessionStoreError::NonAbsoluteCreateCwd {
                path: cwd.to_path_buf(),
            });
        }

        let root = session_root(cwd);
        std::fs::create_dir_all(&root)
            .map_err(|source| SessionStoreError::io("creating session root", &root, source))?;

        let session_id = Uuid::new_v4().to_string();
        let created_at = now_rfc3339()?;
        let header = SessionHeader::v1(
            session_id.clone(),
            created_at.clone(),
            cwd.display().to_string(),
        );

        let path = root.join(session_file_name(&created_at, &session_id));
        let mut file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(&path)
            .map_err(|source| SessionStoreError::io("creating session file", &path, source))?;

        let header_json = serde_json::to_string(&header)
            .map_err(|source| SessionStoreError::json_serialize(&path, source))?;
        writeln!(file, "{header_json}")
            .map_err(|source| SessionStoreError::io("writing session header", &path, source))?;

        Ok(Self {
            path,
            file,
            header,
            entries: Vec::new(),
            current_leaf_id: None,
        })
    }

    /// Open and fully validate an existing transcript, then position for
    /// appending. Every line must parse; ids must be unique; parents must
    /// refer to earlier entries.
    pub fn open(path: &Path) -> Result<Self, SessionStoreError> {
        let path = path.to_path_buf();
        let read_file = File::open(&path)
            .map_err(|source| SessionStoreError::io("opening session file", &path, source))?;
        let reader = BufReader::new(read_file);

        let mut header: Option<SessionHeader> = None;
        let mut entries_with_lines: Vec<(usize, SessionEntry)> = Vec::new();
        let mut index_by_id = HashMap::new();

        for (line_index, line_result) in reader.lines().enumerate() {
            let line_number = line_index + 1;
            let line = line_result
                .map_err(|source| SessionStoreError::io_line(&path, line_number, source))?;
            let parsed = parse_json_line(&path, line_number, &line)?;

            if line_number == 1 {
                match parsed {
                    JsonLine::Session(parsed_header) => {
                        validate_header_line(&path, line_number, &parsed_header)?;
                        header = Some(parsed_header);
                    }
                    JsonLine::Entry(_) => {
                        return Err(SessionStoreError::InvalidHeaderRecord {
                            path,
                            line: line_number,
                        });
                    }
                }

                continue;
            }

            match parsed {
                JsonLine::Session(_) => {
                    return Err(SessionStoreError::InvalidEntryRecord {
                        path,
                        line: line_number,
                    });
                }
                JsonLine::Entry(entry) => {
                    validate_entry_line(&path, line_number, &entry)?;
                    if index_by_id.contains_key(&entry.id) {
                        return Err(SessionStoreError::DuplicateEntryId {
                            path,
                            line: line_number,
                            id: entry.id,
                        });
                    }

                    let next_index = entries_with_lines.len();
                    index_by_id.insert(entry.id.clone(), next_index);
                    entries_with_lines.push((line_number, entry));
                }
            }
        }

        let header =
            header.ok_or_else(|| SessionStoreError::MissingHeader { path: path.clone() })?;
        validate_entry_graph(&path, &entries_with_lines, &index_by_id)?;

        let entries = entries_with_lines
            .into_iter()
            .map(|(_, entry)| entry)
            .collect::<Vec<_>>();
        let current_leaf_id = entries.last().map(|entry| entry.id.clone());

        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|source| {
                SessionStoreError::io("opening session file for append", &path, source)
            })?;

        Ok(Self {
            path,
            file,
            header,
            entries,
            current_leaf_id,
        })
    }

    /// Record one entry. The store stamps the id, the timestamp, and the
    /// parent link to the current leaf; callers only say what happened.
    pub fn append(&mut self, kind: SessionEntryKind) -> Result<(), SessionStoreError> {
        let entry = SessionEntry::new(
            Uuid::new_v4().to_string(),
            self.current_leaf_id.clone(),
            now_rfc3339()?,
            kind,
        );

        let line = serde_json::to_string(&entry)
            .map_err(|source| SessionStoreError::json_serialize(&self.path, source))?;
        writeln!(self.file, "{line}").map_err(|source| {
            SessionStoreError::io("appending session entry", &self.path, source)
        })?;

        self.current_leaf_id = Some(entry.id.clone());
        self.entries.push(entry);
        Ok(())
    }

    /// The most recently modified `.jsonl` transcript under the session
    /// root, for resuming the last conversation.
    pub fn latest_session_path(cwd: &Path) -> Result<PathBuf, SessionStoreError> {
        let root = session_root(cwd);
        let reader = std::fs::read_dir(&root)
            .map_err(|_| SessionStoreError::NoSessionsFound { root: root.clone() })?;

        let mut newest: Option<(SystemTime, PathBuf)> = None;
        for dir_entry in reader {
            let dir_entry = dir_entry
                .map_err(|source| SessionStoreError::io("listing session root", &root, source))?;
            let path = dir_entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("jsonl") {
                continue;
            }
            let modified = dir_entry
                .metadata()
                .and_then(|metadata| metadata.modified())
                .map_err(|source| {
                    SessionStoreError::io("reading session file metadata", &path, source)
                })?;
            let is_newer = match &newest {
                Some((best, _)) => modified >= *best,
                None => true,
            };
            if is_newer {
                newest = Some((modified, path));
            }
        }

        newest
            .map(|(_, path)| path)
            .ok_or(SessionStoreError::NoSessionsFound { root })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn header(&self) -> &SessionHeader {
        &self.header
    }

    #[must_use]
    pub fn current_leaf_id(&self) -> Option<&str> {
        self.current_leaf_id.as_deref()
    }
}

fn now_rfc3339() -> Result<String, SessionStoreError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(SessionStoreError::ClockFormat)
}

pub(crate) fn parse_json_line(
    path: &Path,
    line_number: usize,
    line: &str,
) -> Result<JsonLine, SessionStoreError> {
    JsonLine::parse(line).map_err(|source| SessionStoreError::json_line(path, line_number, source))
}

pub(crate) fn validate_header_line(
    path: &Path,
    line_number: usize,
    header: &SessionHeader,
) -> Result<(), SessionStoreError> {
    if header.version != 1 {
        return Err(SessionStoreError::UnsupportedVersion {
            path: path.to_path_buf(),
            line: line_number,
            found: header.version,
        });
    }

    validate_rfc3339(path, line_number, "created_at", &header.created_at)?;

    if !Path::new(&header.cwd).is_absolute() {
        return Err(SessionStoreError::NonAbsoluteCwd {
            path: path.to_path_buf(),
            line: line_number,
            cwd: header.cwd.clone(),
        });
    }

    Ok(())
}

pub(crate) fn validate_entry_line(
    path: &Path,
    line_number: usize,
    entry: &SessionEntry,
) -> Result<(), SessionStoreError> {
    validate_rfc3339(path, line_number, "ts", &entry.ts)
}

pub(crate) fn validate_entry_graph(
    path: &Path,
    entries_with_lines: &[(usize, SessionEntry)],
    index_by_id: &HashMap<String, usize>,
) -> Result<(), SessionStoreError> {
    for (line_number, entry) in entries_with_lines {
        if let Some(parent_id) = &entry.parent_id {
            if !index_by_id.contains_key(parent_id) {
                return Err(SessionStoreError::DanglingParentId {
                    path: path.to_path_buf(),
                    line: *line_number,
                    entry_id: entry.id.clone(),
                    parent_id: parent_id.clone(),
                });
            }
        }
    }

    Ok(())
}

pub(crate) fn validate_rfc3339(
    path: &Path,
    line_number: usize,
    field: &'static str,
    value: &str,
) -> Result<(), SessionStoreError> {
    if OffsetDateTime::parse(value, &Rfc3339).is_err() {
        return Err(SessionStoreError::InvalidTimestamp {
            path: path.to_path_buf(),
            line: line_number,
            field,
            value: value.to_string(),
        });
    }

    Ok(())
}
