//! Blocking subprocess execution with a hard timeout.

use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;

use wait_timeout::ChildExt;

const OUTPUT_BYTE_LIMIT: usize = 100 * 1024;

/// Outcome of one subprocess run.
///
/// Spawn failures, non-zero exits, and hard timeouts are all failure
/// records, never errors: `success` is false and `stderr` carries a trailing
/// status line saying why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutcome {
    fn failed_to_run(detail: String) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: detail,
        }
    }
}

/// Run `command` with `args` in `working_dir`, killing the child once
/// `timeout_ms` elapses. Output is captured and capped per stream.
pub fn run_command(command: &str, args: &[&str], working_dir: &Path, timeout_ms: u64) -> RunOutcome {
    let mut child = match Command::new(command)
        .args(args)
        .current_dir(working_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(error) => {
            return RunOutcome::failed_to_run(format!("Failed to launch {command}: {error}"));
        }
    };

    let (timed_out, status) = match child.wait_timeout(Duration::from_millis(timeout_ms)) {
        Ok(Some(status)) => (false, status),
        Ok(None) => {
            let _ = child.kill();
            match child.wait() {
                Ok(status) => (true, status),
                Err(error) => {
                    return RunOutcome::failed_to_run(format!(
                        "Command timed out after {timeout_ms}ms and wait failed: {error}"
                    ));
                }
            }
        }
        Err(error) => {
            let _ = child.kill();
            return RunOutcome::failed_to_run(format!("Failed waiting for {command}: {error}"));
        }
    };

    let stdout_bytes = read_pipe_bytes(child.stdout.take());
    let stderr_bytes = read_pipe_bytes(child.stderr.take());

    let stdout = truncate_to_byte_limit(
        String::from_utf8_lossy(&stdout_bytes).into_owned(),
        OUTPUT_BYTE_LIMIT,
    );
    let mut stderr = truncate_to_byte_limit(
        String::from_utf8_lossy(&stderr_bytes).into_owned(),
        OUTPUT_BYTE_LIMIT,
    );

    let success = !timed_out && status.success();
    if !success {
        let status_label = if timed_out {
            format!("timeout after {timeout_ms}ms")
        } else {
            format_exit_status(status)
        };
        if !stderr.is_empty() && !stderr.ends_with('\n') {
            stderr.push('\n');
        }
        stderr.push_str(&format!("status: {status_label}"));
    }

    RunOutcome {
        success,
        stdout,
        stderr,
    }
}

fn read_pipe_bytes(pipe: Option<impl Read>) -> Vec<u8> {
    let Some(mut pipe) = pipe else {
        return Vec::new();
    };

    let mut bytes = Vec::new();
    let _ = pipe.read_to_end(&mut bytes);
    bytes
}

fn truncate_to_byte_limit(content: String, max_bytes: usize) -> String {
    if content.len() <= max_bytes {
        return content;
    }

    let mut cutoff = max_bytes.min(content.len());
    while cutoff > 0 && !content.is_char_boundary(cutoff) {
        cutoff -= 1;
    }

    let mut truncated = content[..cutoff].to_string();
    truncated.push_str("\n[truncated]");
    truncated
}

fn format_exit_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit_code={code}"),
        None => "exit_code=terminated_by_signal".to_string(),
    }
}
