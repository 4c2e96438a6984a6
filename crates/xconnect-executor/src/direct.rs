//! Direct commands: the closed set of prompts executed as-is.
//!
//! Anything outside the set is treated as indirect input and echoed back
//! rather than run. Both the plain local intake and the peer router's local
//! branch classify through [`LocalCommand::classify`].

use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use xconnect_core::{ErrorKind, ExecutionContext, ExecutionResult};
use xconnect_shell::UnixShell;

use crate::process::{run_script, to_result};

/// Direct command error.
#[derive(Debug, Error)]
pub enum DirectCommandError {
    #[error("Relative paths with '..' are not allowed for security reasons.")]
    TraversalRejected(String),
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),
    #[error("Command execution failed: {0}")]
    Io(#[from] std::io::Error),
}

impl DirectCommandError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::TraversalRejected(_) => ErrorKind::SecurityRejection,
            Self::DirectoryNotFound(_) => ErrorKind::DirectoryNotFound,
            Self::Io(_) => ErrorKind::CommandFailure,
        }
    }
}

/// Direct commands run through the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellCommandKind {
    List,
    MakeDir,
    PrintDir,
    Echo,
    Remove,
    Cat,
    Touch,
}

impl ShellCommandKind {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "ls" => Self::List,
            "mkdir" => Self::MakeDir,
            "pwd" => Self::PrintDir,
            "echo" => Self::Echo,
            "rm" => Self::Remove,
            "cat" => Self::Cat,
            "touch" => Self::Touch,
            _ => return None,
        })
    }

    /// Whether the command is meaningless without arguments.
    #[must_use]
    pub const fn requires_args(self) -> bool {
        !matches!(self, Self::List | Self::PrintDir)
    }
}

/// A recognized direct command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectCommand {
    /// Change the session's working directory.
    ChangeDir(String),
    /// Run the command line through the shell.
    Shell {
        kind: ShellCommandKind,
        line: String,
    },
}

/// Outcome of a direct command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectOutcome {
    /// The working directory should become this absolute path.
    Changed(PathBuf),
    Ran(ExecutionResult),
}

impl DirectCommand {
    /// Recognize a direct command, or `None` for indirect input.
    #[must_use]
    pub fn parse(prompt: &str) -> Option<Self> {
        let line = prompt.trim();
        let (name, args) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(n, a)| (n, a.trim()));

        if name == "cd" {
            return (!args.is_empty()).then(|| Self::ChangeDir(args.to_string()));
        }

        let kind = ShellCommandKind::from_name(name)?;
        if kind.requires_args() && args.is_empty() {
            return None;
        }
        Some(Self::Shell {
            kind,
            line: line.to_string(),
        })
    }

    /// Execute against `ctx`.
    ///
    /// `ChangeDir` only validates and resolves the target; applying it is the
    /// caller's job.
    ///
    /// # Errors
    /// Returns error on traversal attempts, missing directories, or spawn failure.
    pub async fn run(
        &self,
        shell: &UnixShell,
        ctx: &ExecutionContext,
    ) -> Result<DirectOutcome, DirectCommandError> {
        match self {
            Self::ChangeDir(target) => resolve_change_dir(ctx.working_dir(), target)
                .await
                .map(DirectOutcome::Changed),
            Self::Shell { line, .. } => {
                tracing::info!(command = %line, "Executing direct command");
                let output = run_script(shell, line, &[], ctx).await?;
                Ok(DirectOutcome::Ran(to_result(&output)))
            }
        }
    }
}

/// Resolve the target of a directory change.
///
/// Traversal segments are rejected before the filesystem is consulted.
/// `~` expands to the home directory; relative targets resolve against `cwd`.
///
/// # Errors
/// Returns error if the target contains `..` or is not an existing directory.
pub async fn resolve_change_dir(cwd: &Path, target: &str) -> Result<PathBuf, DirectCommandError> {
    let target = target.trim();
    if Path::new(target)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        tracing::warn!(target, "Rejected directory traversal");
        return Err(DirectCommandError::TraversalRejected(target.to_string()));
    }

    let expanded = expand_home(target);
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };

    match tokio::fs::canonicalize(&absolute).await {
        Ok(path) if path.is_dir() => Ok(path),
        _ => Err(DirectCommandError::DirectoryNotFound(absolute)),
    }
}

fn expand_home(target: &str) -> PathBuf {
    let rest = match target {
        "~" => Some(""),
        t => t.strip_prefix("~/"),
    };
    match (rest, dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(target),
    }
}

/// Classification of a local prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalCommand {
    Direct(DirectCommand),
    Indirect(String),
}

impl LocalCommand {
    #[must_use]
    pub fn classify(prompt: &str) -> Self {
        DirectCommand::parse(prompt)
            .map_or_else(|| Self::Indirect(prompt.trim().to_string()), Self::Direct)
    }
}

#[cfg(test)]
mod tests {
    use xconnect_core::EnvironmentSnapshot;

    use super::*;

    fn sh() -> UnixShell {
        UnixShell::Sh(PathBuf::from("/bin/sh"))
    }

    #[test]
    fn test_parse_recognized_commands() {
        assert_eq!(
            DirectCommand::parse("cd /tmp"),
            Some(DirectCommand::ChangeDir("/tmp".to_string()))
        );
        assert_eq!(
            DirectCommand::parse("  ls -la "),
            Some(DirectCommand::Shell {
                kind: ShellCommandKind::List,
                line: "ls -la".to_string()
            })
        );
        assert!(matches!(
            DirectCommand::parse("pwd"),
            Some(DirectCommand::Shell {
                kind: ShellCommandKind::PrintDir,
                ..
            })
        ));
        assert!(matches!(
            DirectCommand::parse("echo hi"),
            Some(DirectCommand::Shell {
                kind: ShellCommandKind::Echo,
                ..
            })
        ));
    }

    #[test]
    fn test_parse_rejects_lookalikes_and_missing_args() {
        assert_eq!(DirectCommand::parse("lsblk"), None);
        assert_eq!(DirectCommand::parse("pwdx 1"), None);
        assert_eq!(DirectCommand::parse("cd"), None);
        assert_eq!(DirectCommand::parse("rm"), None);
        assert_eq!(DirectCommand::parse("git status"), None);
    }

    #[test]
    fn test_classify_indirect() {
        assert_eq!(
            LocalCommand::classify("summarize the logs"),
            LocalCommand::Indirect("summarize the logs".to_string())
        );
    }

    #[tokio::test]
    async fn test_change_dir_rejects_traversal_before_lookup() {
        let err = resolve_change_dir(Path::new("/nonexistent-root"), "../etc")
            .await
            .unwrap_err();
        assert!(matches!(err, DirectCommandError::TraversalRejected(_)));
        assert_eq!(err.kind(), ErrorKind::SecurityRejection);

        let err = resolve_change_dir(Path::new("/"), "tmp/../etc").await.unwrap_err();
        assert!(matches!(err, DirectCommandError::TraversalRejected(_)));
    }

    #[tokio::test]
    async fn test_change_dir_resolves_relative() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let resolved = resolve_change_dir(dir.path(), "sub").await.unwrap();
        assert_eq!(
            resolved,
            std::fs::canonicalize(dir.path().join("sub")).unwrap()
        );
    }

    #[tokio::test]
    async fn test_change_dir_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_change_dir(dir.path(), "nope").await.unwrap_err();
        assert!(matches!(err, DirectCommandError::DirectoryNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::DirectoryNotFound);
    }

    #[tokio::test]
    async fn test_shell_command_runs_in_context() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let ctx = ExecutionContext::new(dir.path().to_path_buf(), EnvironmentSnapshot::from_process());

        let cmd = DirectCommand::parse("ls").unwrap();
        let DirectOutcome::Ran(result) = cmd.run(&sh(), &ctx).await.unwrap() else {
            panic!("expected shell outcome");
        };
        assert_eq!(result.stdout, "marker.txt");
        assert!(result.success());

        let cmd = DirectCommand::parse("cat missing.txt").unwrap();
        let DirectOutcome::Ran(result) = cmd.run(&sh(), &ctx).await.unwrap() else {
            panic!("expected shell outcome");
        };
        assert!(!result.success());
        assert!(!result.stderr.is_empty());
    }
}
