//! Execution context for shell commands.

use std::path::{Path, PathBuf};

use crate::EnvironmentSnapshot;

/// Starting state handed to an executor for one command.
///
/// The context is passed by reference into the execution call; the executor
/// never reads the process's ambient environment or working directory.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Working directory the command starts in.
    pub working_dir: PathBuf,

    /// Environment the command starts with.
    pub env: EnvironmentSnapshot,
}

impl ExecutionContext {
    /// Create a context from a working directory and environment.
    #[must_use]
    pub const fn new(working_dir: PathBuf, env: EnvironmentSnapshot) -> Self {
        Self { working_dir, env }
    }

    /// Context rooted at the current process state.
    ///
    /// # Errors
    /// Returns error if the current directory cannot be determined.
    pub fn from_process() -> std::io::Result<Self> {
        Ok(Self::new(
            std::env::current_dir()?,
            EnvironmentSnapshot::from_process(),
        ))
    }

    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}
