//! Slash-command table and input classification.
//!
//! Commands live in one data table; dispatch and `/help` both render from
//! it, so adding a command is a one-line change.

/// What the REPL should do with one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// Send the line as a chat turn.
    Chat(String),
    /// Run a recognized slash command.
    Command(CommandAction),
    /// Run a shell command through the process runner.
    Shell(String),
    /// An unrecognized slash command, reported back verbatim.
    Unknown(String),
}

/// Dispatch target for a recognized slash command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    Help,
    Clear,
    Retry,
    Quit,
}

/// One entry in the command table.
pub struct CommandSpec {
    pub name: &'static str,
    pub summary: &'static str,
    pub action: CommandAction,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "/help",
        summary: "Show this help text",
        action: CommandAction::Help,
    },
    CommandSpec {
        name: "/clear",
        summary: "Start the conversation over",
        action: CommandAction::Clear,
    },
    CommandSpec {
        name: "/retry",
        summary: "Send the last message again",
        action: CommandAction::Retry,
    },
    CommandSpec {
        name: "/quit",
        summary: "Exit the assistant",
        action: CommandAction::Quit,
    },
];

/// Classify one non-empty input line.
///
/// `/name` resolves through the command table (arguments after the name are
/// ignored), `!cmd` becomes a shell escape, anything else is chat.
#[must_use]
pub fn classify_input(line: &str) -> InputAction {
    let trimmed = line.trim();

    if let Some(rest) = trimmed.strip_prefix('!') {
        return InputAction::Shell(rest.trim().to_string());
    }

    if trimmed.starts_with('/') {
        let name = trimmed.split_whitespace().next().unwrap_or(trimmed);
        return match COMMANDS.iter().find(|spec| spec.name == name) {
            Some(spec) => InputAction::Command(spec.action),
            None => InputAction::Unknown(name.to_string()),
        };
    }

    InputAction::Chat(trimmed.to_string())
}

/// Render the `/help` output from the command table.
#[must_use]
pub fn help_text() -> String {
    let mut text = String::from("Commands:\n");
    for spec in COMMANDS {
        text.push_str(&format!("  {:<7} {}\n", spec.name, spec.summary));
    }
    text.push_str("  !<cmd>  Run a shell command in the working directory\n");
    text
}
