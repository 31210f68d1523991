//! Applying extracted file instructions to the workspace.
//!
//! Paths resolve relative to a canonicalized workspace root and may not
//! escape it, including through `..` or symlinked parents. Parent
//! directories are created on demand.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use code_blocks::FileInstruction;

/// Answer to one apply confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyChoice {
    /// Write this file.
    Yes,
    /// Skip this file.
    No,
    /// Write this file and the rest of the current batch unprompted.
    AllBatch,
    /// Write everything for the rest of the session unprompted.
    AlwaysSession,
}

/// Asks whether a file should be written.
pub trait ApplyPrompt {
    fn confirm(&mut self, path: &Path) -> ApplyChoice;
}

/// Terminal prompt reading one answer line from stdin.
///
/// An unreadable stdin or a plain Enter both answer `No`; writing a file is
/// never the silent default.
pub struct TerminalPrompt;

impl ApplyPrompt for TerminalPrompt {
    fn confirm(&mut self, path: &Path) -> ApplyChoice {
        loop {
            print!(
                "apply {}? [y]es / [n]o / [a]ll this batch / [A]lways: ",
                path.display()
            );
            let _ = io::stdout().flush();

            let mut line = String::new();
            match io::stdin().lock().read_line(&mut line) {
                Ok(0) | Err(_) => return ApplyChoice::No,
                Ok(_) => {}
            }
            match line.trim() {
                "y" | "yes" => return ApplyChoice::Yes,
                "n" | "no" | "" => return ApplyChoice::No,
                "a" | "all" => return ApplyChoice::AllBatch,
                "A" | "always" => return ApplyChoice::AlwaysSession,
                other => println!("unrecognized answer '{other}'; expected y, n, a, or A"),
            }
        }
    }
}

/// Result of applying one instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub ok: bool,
    pub resulting_path: Option<PathBuf>,
    pub detail: String,
}

impl ApplyOutcome {
    fn written(path: PathBuf) -> Self {
        Self {
            ok: true,
            detail: format!("Wrote {}", path.display()),
            resulting_path: Some(path),
        }
    }

    fn skipped(path: &str) -> Self {
        Self {
            ok: false,
            resulting_path: None,
            detail: format!("Skipped {path}"),
        }
    }

    fn rejected(detail: String) -> Self {
        Self {
            ok: false,
            resulting_path: None,
            detail,
        }
    }
}

/// Writes file instructions under a canonicalized workspace root.
pub struct FileApplier {
    workspace_root: PathBuf,
    auto_apply: bool,
}

impl FileApplier {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Result<Self, String> {
        let workspace_root = workspace_root.into();
        let canonical_root = workspace_root
            .canonicalize()
            .map_err(|err| format!("Failed to resolve workspace root: {err}"))?;

        if !canonical_root.is_dir() {
            return Err("Workspace root must be a directory".to_string());
        }

        Ok(Self {
            workspace_root: canonical_root,
            auto_apply: false,
        })
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    #[must_use]
    pub fn auto_apply(&self) -> bool {
        self.auto_apply
    }

    /// Apply one instruction without prompting.
    pub fn apply(&self, instruction: &FileInstruction) -> ApplyOutcome {
        match self.write_instruction(instruction) {
            Ok(path) => ApplyOutcome::written(path),
            Err(detail) => ApplyOutcome::rejected(detail),
        }
    }

    /// Apply a batch in order, asking `prompt` per file unless auto-apply is
    /// already on. `AllBatch` stops prompting for the rest of this batch;
    /// `AlwaysSession` turns auto-apply on for the rest of the session.
    pub fn apply_batch(
        &mut self,
        instructions: &[FileInstruction],
        prompt: &mut dyn ApplyPrompt,
    ) -> Vec<ApplyOutcome> {
        let mut all_batch = false;
        let mut outcomes = Vec::with_capacity(instructions.len());
        for instruction in instructions {
            let choice = if self.auto_apply || all_batch {
                ApplyChoice::Yes
            } else {
                prompt.confirm(Path::new(&instruction.path))
            };

            match choice {
                ApplyChoice::No => {
                    outcomes.push(ApplyOutcome::skipped(&instruction.path));
                    continue;
                }
                ApplyChoice::AllBatch => all_batch = true,
                ApplyChoice::AlwaysSession => self.auto_apply = true,
                ApplyChoice::Yes => {}
            }
            outcomes.push(self.apply(instruction));
        }
        outcomes
    }

    fn write_instruction(&self, instruction: &FileInstruction) -> Result<PathBuf, String> {
        let resolved = self.resolve_write_path(&instruction.path)?;

        let parent = resolved.parent().ok_or_else(|| {
            format!(
                "Path {} has no parent directory and cannot be written safely",
                resolved.display()
            )
        })?;
        fs::create_dir_all(parent).map_err(|error| {
            format!(
                "Failed to create parent directories {}: {error}",
                parent.display()
            )
        })?;

        // The parent exists now; canonicalize again in case creation routed
        // through a symlink.
        let canonical_parent = parent
            .canonicalize()
            .map_err(|error| format!("Failed to resolve write parent {}: {error}", parent.display()))?;
        self.ensure_inside_workspace(&canonical_parent)?;

        fs::write(&resolved, &instruction.content)
            .map_err(|error| format!("Failed to write file {}: {error}", resolved.display()))?;

        Ok(resolved)
    }

    fn resolve_write_path(&self, path: &str) -> Result<PathBuf, String> {
        if path.trim().is_empty() {
            return Err("Path must not be empty".to_string());
        }

        let candidate = self.absolute_candidate(path);
        let parent = candidate.parent().ok_or_else(|| {
            format!(
                "Path {} has no parent directory and cannot be written safely",
                candidate.display()
            )
        })?;

        let anchor = canonicalize_existing_ancestor(parent)?;
        self.ensure_inside_workspace(&anchor)?;

        Ok(candidate)
    }

    fn absolute_candidate(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }

    fn ensure_inside_workspace(&self, canonical_path: &Path) -> Result<(), String> {
        if canonical_path.starts_with(&self.workspace_root) {
            Ok(())
        } else {
            Err(format!(
                "Path escapes workspace root: {}",
                canonical_path.display()
            ))
        }
    }
}

fn canonicalize_existing_ancestor(path: &Path) -> Result<PathBuf, String> {
    for ancestor in path.ancestors() {
        if ancestor.exists() {
            return ancestor.canonicalize().map_err(|error| {
                format!("Failed to resolve path {}: {error}", ancestor.display())
            });
        }
    }

    Err(format!(
        "No existing ancestor found for path {}",
        path.display()
    ))
}
