//! Unix shell detection and script helpers.

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use thiserror::Error;

/// Shell resolution error.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Shell not found: {0}")]
    NotFound(String),
    #[error("Failed to quote path: {0}")]
    Quote(#[from] shlex::QuoteError),
}

/// Resolve an executable by name.
///
/// Absolute paths are accepted as-is when they point at a file; anything else
/// is looked up on the current PATH via `which`.
pub async fn resolve_executable_path(executable: &str) -> Option<PathBuf> {
    if executable.trim().is_empty() {
        return None;
    }

    let path = Path::new(executable);
    if path.is_absolute() {
        return path.is_file().then(|| path.to_path_buf());
    }

    which_async(executable).await
}

async fn which_async(executable: &str) -> Option<PathBuf> {
    let executable = executable.to_string();
    tokio::task::spawn_blocking(move || which::which(executable))
        .await
        .ok()
        .and_then(Result::ok)
}

/// Resolve the shell used to run commands.
///
/// An explicit name or path wins; otherwise `$SHELL`, falling back to
/// `/bin/sh`.
///
/// # Errors
/// Returns error if the configured shell cannot be found.
pub async fn resolve_shell(configured: Option<&str>) -> Result<UnixShell, ShellError> {
    let Some(name) = configured else {
        return Ok(UnixShell::current_shell());
    };
    let path = resolve_executable_path(name)
        .await
        .ok_or_else(|| ShellError::NotFound(name.to_string()))?;
    tracing::debug!(shell = %path.display(), "Resolved shell");
    UnixShell::from_path(&path).ok_or_else(|| ShellError::NotFound(name.to_string()))
}

/// Unix shell types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnixShell {
    Zsh(PathBuf),
    Bash(PathBuf),
    Sh(PathBuf),
    Other(PathBuf),
}

impl UnixShell {
    /// Get the shell path.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Zsh(p) | Self::Bash(p) | Self::Sh(p) | Self::Other(p) => p,
        }
    }

    /// Lines that must run before a profile is sourced.
    ///
    /// Non-interactive bash ignores aliases unless told otherwise.
    #[must_use]
    pub fn prelude(&self) -> &'static [&'static str] {
        match self {
            Self::Bash(_) => &["shopt -s expand_aliases"],
            Self::Zsh(_) | Self::Sh(_) | Self::Other(_) => &[],
        }
    }

    /// Command that sources `file` into the running shell.
    ///
    /// Uses the POSIX `.` builtin so it works in every flavour.
    ///
    /// # Errors
    /// Returns error if the path cannot be quoted.
    pub fn source_command(file: &Path) -> Result<String, ShellError> {
        let lossy = file.to_string_lossy();
        let escaped = shlex::try_quote(&lossy)?;
        Ok(format!(". {escaped}"))
    }

    /// Get the current shell from `$SHELL`.
    #[must_use]
    pub fn current_shell() -> Self {
        if let Ok(shell) = std::env::var("SHELL") {
            if let Some(shell) = Self::from_path(Path::new(&shell)) {
                return shell;
            }
        }
        Self::Sh(PathBuf::from("/bin/sh"))
    }

    /// Classify an absolute path to an existing shell binary.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        if !path.is_absolute() || !path.is_file() {
            return None;
        }
        let path_buf = path.to_path_buf();
        Some(match path.file_name().and_then(OsStr::to_str) {
            Some("zsh") => Self::Zsh(path_buf),
            Some("bash") => Self::Bash(path_buf),
            Some("sh") => Self::Sh(path_buf),
            _ => Self::Other(path_buf),
        })
    }

    /// Program and flag that run a script string.
    #[must_use]
    pub fn get_shell_command(&self) -> (String, &'static str) {
        (self.path().to_string_lossy().into_owned(), "-c")
    }
}
