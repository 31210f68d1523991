//! Interactive line-oriented front end.
//!
//! Line editing and history come from rustyline; a turn in flight is
//! interruptible through the shared cancellation flag, which the SIGINT
//! handler sets and the next turn resets. Between turns Ctrl-C just clears
//! the line and Ctrl-D exits.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use chat_api::{CancellationSignal, ChatApiError};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::apply::{FileApplier, TerminalPrompt};
use crate::commands::{classify_input, help_text, CommandAction, InputAction};
use crate::process::run_command;
use crate::session::{ChatBackend, DisplaySink, Session, TurnOutcome};

const PROMPT: &str = ">>> ";
const SHELL_TIMEOUT_MS: u64 = 30_000;

/// Streams display text straight to stdout, flushed per delta so partial
/// lines appear as they arrive.
pub struct StdoutSink;

impl DisplaySink for StdoutSink {
    fn show(&mut self, text: &str) {
        print!("{text}");
        let _ = io::stdout().flush();
    }
}

/// Where the line-edit history lives, alongside the session transcripts.
fn history_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".chat_assistant")
        .join("history")
}

pub struct Repl<B: ChatBackend> {
    editor: DefaultEditor,
    session: Session<B>,
    applier: FileApplier,
    prompt: TerminalPrompt,
    cancel: CancellationSignal,
    cwd: PathBuf,
}

impl<B: ChatBackend> Repl<B> {
    pub fn new(
        session: Session<B>,
        applier: FileApplier,
        cancel: CancellationSignal,
        cwd: PathBuf,
    ) -> io::Result<Self> {
        let editor = DefaultEditor::new().map_err(io::Error::other)?;
        Ok(Self {
            editor,
            session,
            applier,
            prompt: TerminalPrompt,
            cancel,
            cwd,
        })
    }

    /// Read and dispatch lines until `/quit` or Ctrl-D.
    pub fn run(&mut self) -> io::Result<()> {
        let history = history_path();
        if history.exists() {
            let _ = self.editor.load_history(&history);
        }

        println!("Chat assistant ready. /help for commands, Ctrl-D to exit.");

        loop {
            let line = match self.editor.readline(PROMPT) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(error) => {
                    eprintln!("input error: {error}");
                    break;
                }
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let _ = self.editor.add_history_entry(trimmed);

            match classify_input(trimmed) {
                InputAction::Command(CommandAction::Quit) => break,
                InputAction::Command(CommandAction::Help) => print!("{}", help_text()),
                InputAction::Command(CommandAction::Clear) => {
                    self.session.clear();
                    println!("Conversation cleared.");
                }
                InputAction::Command(CommandAction::Retry) => {
                    self.cancel.store(false, Ordering::SeqCst);
                    match self.session.retry(&mut StdoutSink, self.cancel.clone()) {
                        Some(result) => self.finish_turn(result),
                        None => println!("Nothing to retry yet."),
                    }
                }
                InputAction::Unknown(name) => {
                    println!("Unknown command: {name}. Try /help");
                }
                InputAction::Shell(command) => self.run_shell(&command),
                InputAction::Chat(text) => {
                    self.cancel.store(false, Ordering::SeqCst);
                    let result = self
                        .session
                        .submit(&text, &mut StdoutSink, self.cancel.clone());
                    self.finish_turn(result);
                }
            }
        }

        if let Some(parent) = history.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let _ = self.editor.save_history(&history);

        Ok(())
    }

    fn finish_turn(&mut self, result: Result<TurnOutcome, ChatApiError>) {
        // End whatever partial line the stream left on screen.
        println!();
        match result {
            Ok(outcome) => self.apply_instructions(outcome),
            Err(error) => println!("error: {error}"),
        }
    }

    fn apply_instructions(&mut self, outcome: TurnOutcome) {
        if outcome.instructions.is_empty() {
            return;
        }

        let applied = self
            .applier
            .apply_batch(&outcome.instructions, &mut self.prompt);
        for (instruction, result) in outcome.instructions.iter().zip(&applied) {
            println!("{}", result.detail);
            if result.ok {
                self.session
                    .record_file_write(&instruction.path, &instruction.language);
            }
        }
    }

    fn run_shell(&mut self, command: &str) {
        if command.is_empty() {
            println!("usage: !<command>");
            return;
        }

        let outcome = run_command("bash", &["-lc", command], &self.cwd, SHELL_TIMEOUT_MS);
        if !outcome.stdout.is_empty() {
            print!("{}", outcome.stdout);
            if !outcome.stdout.ends_with('\n') {
                println!();
            }
        }
        if !outcome.stderr.is_empty() {
            eprint!("{}", outcome.stderr);
            if !outcome.stderr.ends_with('\n') {
                eprintln!();
            }
        }
    }
}
