//! Interactive terminal chat assistant.
//!
//! The root crate wires the workspace together: a synchronous REPL drives a
//! per-turn orchestrator that streams completions through `chat_api`, routes
//! every delta through the `code_blocks` extractor so fenced, path-tagged
//! code never reaches the screen, applies extracted files under the
//! workspace root, and records committed turns with `session_store`.
//!
//! # Configuration
//! - `CHAT_ASSISTANT_CONFIG_PATH` names a JSON config file; unset means
//!   defaults (DeepSeek endpoint, `deepseek-chat` model).
//! - `CHAT_ASSISTANT_ENDPOINT`, `CHAT_ASSISTANT_API_KEY` and
//!   `CHAT_ASSISTANT_MODEL` override the file.
//! - `CHAT_ASSISTANT_SESSION` names an existing transcript to resume;
//!   otherwise each run starts a fresh one under
//!   `<cwd>/.chat_assistant/sessions/`.

pub mod apply;
pub mod backend;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod process;
pub mod repl;
pub mod session;
