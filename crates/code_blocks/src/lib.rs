//! Incremental extraction of path-tagged fenced code blocks from streamed
//! text.
//!
//! The extractor is a pure reducer over text deltas: feed it fragments of an
//! assistant response split anywhere, even mid-fence, and it emits the same
//! ordered events as it would for the whole response at once.
//! Chat text streams through as [`BlockEvent::Text`]; a completed
//! ```` ```lang:path ```` block comes out as one [`BlockEvent::File`] the
//! moment its closing fence is seen.
//!
//! Buffering is bounded in both states. While scanning, only a suffix that
//! could still become an opening fence is withheld from display, and that
//! suffix is capped; inside a block, all but a short tail moves into the
//! accumulated content immediately.
//!
//! Blocks are strictly sequential: a literal triple backtick inside block
//! content reads as the closing fence. Nesting is not supported.

/// One completed file-write instruction reconstructed from a fenced block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInstruction {
    pub path: String,
    pub language: String,
    pub content: String,
}

/// Ordered output of the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockEvent {
    /// Chat text to pass through for display.
    Text(String),
    /// A block closed; apply after the stream has drained.
    File(FileInstruction),
}

/// Longest withheld scan suffix before the stale head is released to display.
const SCAN_CARRY_MAX: usize = 100;
/// Tail kept when the scan carry is bounded, so an opening fence split
/// across the release boundary is still usually caught.
const SCAN_CARRY_KEEP: usize = 16;
/// Tail kept while inside a block, so a split closing fence is detected.
const BLOCK_TAIL_KEEP: usize = 10;

const FENCE: &str = "```";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Scanning,
    InBlock,
}

/// Incremental state machine turning streamed text into display text and
/// completed [`FileInstruction`]s.
#[derive(Debug)]
pub struct CodeBlockExtractor {
    mode: Mode,
    carry: String,
    language: String,
    path: String,
    content: String,
}

impl Default for CodeBlockExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeBlockExtractor {
    pub fn new() -> Self {
        Self {
            mode: Mode::Scanning,
            carry: String::new(),
            language: String::new(),
            path: String::new(),
            content: String::new(),
        }
    }

    /// Feed one text delta and drain the events it completes.
    ///
    /// Event order is stable across chunkings: for every way of splitting a
    /// response into deltas, the concatenated `Text` output and the ordered
    /// `File` list are identical once [`flush`](Self::flush) has run.
    pub fn feed(&mut self, delta: &str) -> Vec<BlockEvent> {
        let mut events = Vec::new();
        self.carry.push_str(delta);
        self.advance(&mut events);
        events
    }

    /// End-of-stream: release withheld text, or close an open block
    /// best-effort (emitted only when the trimmed content is non-empty).
    /// Leaves the extractor fresh for the next turn.
    pub fn flush(&mut self) -> Vec<BlockEvent> {
        let mut events = Vec::new();
        match self.mode {
            Mode::Scanning => {
                if !self.carry.is_empty() {
                    events.push(BlockEvent::Text(std::mem::take(&mut self.carry)));
                }
            }
            Mode::InBlock => {
                self.content.push_str(&self.carry);
                let content = self.content.trim().to_string();
                if !content.is_empty() {
                    events.push(BlockEvent::File(FileInstruction {
                        path: std::mem::take(&mut self.path),
                        language: std::mem::take(&mut self.language),
                        content,
                    }));
                }
            }
        }
        self.reset();
        events
    }

    /// Discard all state without emitting anything. Used when a turn is
    /// aborted mid-stream; an abort is not a clean end, so nothing buffered
    /// may leak into the next turn.
    pub fn reset(&mut self) {
        self.mode = Mode::Scanning;
        self.carry.clear();
        self.language.clear();
        self.path.clear();
        self.content.clear();
    }

    /// True when scanning with nothing withheld.
    pub fn is_idle(&self) -> bool {
        self.mode == Mode::Scanning && self.carry.is_empty()
    }

    /// Run a complete response through a fresh extractor in one shot.
    pub fn extract_all(input: &str) -> Vec<BlockEvent> {
        let mut extractor = Self::new();
        let mut events = extractor.feed(input);
        events.extend(extractor.flush());
        events
    }

    fn advance(&mut self, events: &mut Vec<BlockEvent>) {
        loop {
            let again = match self.mode {
                Mode::Scanning => self.scan_step(events),
                Mode::InBlock => self.block_step(events),
            };
            if !again {
                break;
            }
        }
    }

    /// One scanning pass over the carry. Returns true when a transition
    /// happened and the remainder must be reprocessed.
    fn scan_step(&mut self, events: &mut Vec<BlockEvent>) -> bool {
        match analyze_scanning(&self.carry) {
            ScanOutcome::Opening {
                start,
                end,
                language,
                path,
            } => {
                if start > 0 {
                    events.push(BlockEvent::Text(self.carry[..start].to_string()));
                }
                self.carry = self.carry[end..].to_string();
                self.language = language;
                self.path = path;
                self.content.clear();
                self.mode = Mode::InBlock;
                true
            }
            ScanOutcome::Release { upto } => {
                if upto > 0 {
                    let released: String = self.carry.drain(..upto).collect();
                    events.push(BlockEvent::Text(released));
                }
                if self.carry.len() > SCAN_CARRY_MAX {
                    // The withheld suffix outgrew any plausible fence line.
                    // Release all but a short tail; worst case a pathological
                    // fence is shown as chat text, never swallowed.
                    let cut =
                        floor_char_boundary(&self.carry, self.carry.len() - SCAN_CARRY_KEEP);
                    if cut > 0 {
                        let released: String = self.carry.drain(..cut).collect();
                        events.push(BlockEvent::Text(released));
                    }
                }
                false
            }
        }
    }

    /// One in-block pass over the carry. Returns true when the block closed
    /// and the remainder must be rescanned.
    fn block_step(&mut self, events: &mut Vec<BlockEvent>) -> bool {
        if let Some(index) = self.carry.find(FENCE) {
            self.content.push_str(&self.carry[..index]);
            events.push(BlockEvent::File(FileInstruction {
                path: std::mem::take(&mut self.path),
                language: std::mem::take(&mut self.language),
                content: self.content.trim().to_string(),
            }));
            self.content.clear();
            self.carry = self.carry[index + FENCE.len()..].to_string();
            self.mode = Mode::Scanning;
            true
        } else {
            if self.carry.len() > BLOCK_TAIL_KEEP {
                let cut = floor_char_boundary(&self.carry, self.carry.len() - BLOCK_TAIL_KEEP);
                self.content.push_str(&self.carry[..cut]);
                self.carry.drain(..cut);
            }
            false
        }
    }
}

enum ScanOutcome {
    /// A complete opening fence: `carry[start..end]` is the fence line,
    /// everything before it is display text.
    Opening {
        start: usize,
        end: usize,
        language: String,
        path: String,
    },
    /// No complete fence. `carry[..upto]` can no longer begin one and is
    /// safe to display; the rest stays withheld.
    Release { upto: usize },
}

fn analyze_scanning(carry: &str) -> ScanOutcome {
    let bytes = carry.as_bytes();
    let mut index = 0;
    while index < bytes.len() {
        // Fences start with a backtick; anything else can be released.
        if bytes[index] == b'`' {
            match scan_opening(&carry[index..]) {
                OpeningScan::Complete {
                    len,
                    language,
                    path,
                } => {
                    return ScanOutcome::Opening {
                        start: index,
                        end: index + len,
                        language,
                        path,
                    };
                }
                // A viable prefix consumes the rest of the carry, so no
                // later position can complete first.
                OpeningScan::Partial => return ScanOutcome::Release { upto: index },
                OpeningScan::No => {}
            }
        }
        index += 1;
    }
    ScanOutcome::Release { upto: carry.len() }
}

enum OpeningScan {
    Complete {
        len: usize,
        language: String,
        path: String,
    },
    /// Still a prefix of a valid opening; needs more input to decide.
    Partial,
    /// Cannot be an opening fence at this position.
    No,
}

/// Match `{FENCE}language:path\n` at the start of `text`. The language tag is
/// one or more non-whitespace characters up to the first colon; the path is
/// one or more non-newline characters up to the newline.
fn scan_opening(text: &str) -> OpeningScan {
    let bytes = text.as_bytes();
    for offset in 0..FENCE.len() {
        match bytes.get(offset) {
            None => return OpeningScan::Partial,
            Some(b'`') => {}
            Some(_) => return OpeningScan::No,
        }
    }

    let language_start = FENCE.len();
    let mut cursor = language_start;
    loop {
        let Some(ch) = next_char(text, cursor) else {
            return OpeningScan::Partial;
        };
        if ch == ':' {
            if cursor == language_start {
                return OpeningScan::No;
            }
            break;
        }
        if ch.is_whitespace() {
            return OpeningScan::No;
        }
        cursor += ch.len_utf8();
    }
    let language = text[language_start..cursor].trim().to_string();
    cursor += 1;

    let path_start = cursor;
    loop {
        let Some(ch) = next_char(text, cursor) else {
            return OpeningScan::Partial;
        };
        if ch == '\n' {
            if cursor == path_start {
                return OpeningScan::No;
            }
            return OpeningScan::Complete {
                len: cursor + 1,
                language,
                path: text[path_start..cursor].trim().to_string(),
            };
        }
        cursor += ch.len_utf8();
    }
}

fn next_char(text: &str, at: usize) -> Option<char> {
    text[at..].chars().next()
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
