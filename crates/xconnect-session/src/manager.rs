//! Session state threaded through consecutive requests.

use std::path::PathBuf;

use tokio::sync::Mutex;
use xconnect_core::{
    EnvironmentSnapshot, ExecutionContext, ExecutionResult, Executor, ExecutorError,
};
use xconnect_executor::{DirectCommandError, DirectOutcome, LocalCommand};
use xconnect_shell::UnixShell;

/// Session error.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No prompt provided")]
    EmptyPrompt,
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    #[error(transparent)]
    Direct(#[from] DirectCommandError),
}

/// Result of a locally handled prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalOutcome {
    /// Working directory changed to this path.
    ChangedDir(PathBuf),
    /// A direct command ran.
    Ran(ExecutionResult),
    /// Not a direct command; echoed back instead of run.
    Indirect(String),
}

/// One logical shell session.
///
/// Holds the current environment snapshot and working directory. Every
/// command locks the session for its whole duration, so a command always
/// starts from the state the previous one left behind and concurrent
/// requests are serialized rather than racing on the snapshot.
pub struct ShellSession<E>
where
    E: Executor,
{
    executor: E,
    shell: UnixShell,
    state: Mutex<ExecutionContext>,
}

impl<E> ShellSession<E>
where
    E: Executor,
{
    /// Create a session starting from `bootstrap`.
    #[must_use]
    pub fn new(executor: E, shell: UnixShell, bootstrap: ExecutionContext) -> Self {
        Self {
            executor,
            shell,
            state: Mutex::new(bootstrap),
        }
    }

    /// Run a prompt through the environment-carrying executor.
    ///
    /// When the executor recovers a snapshot it replaces the stored one in
    /// full. If the new snapshot's `PWD` names a directory, the working
    /// directory follows it.
    ///
    /// # Errors
    /// Returns error on a blank prompt or an executor fault. A failing user
    /// command is not an error.
    pub async fn execute(&self, prompt: &str) -> Result<ExecutionResult, SessionError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(SessionError::EmptyPrompt);
        }

        let mut state = self.state.lock().await;
        let outcome = self.executor.execute(&state, prompt).await?;

        if let Some(snapshot) = outcome.snapshot {
            if let Some(pwd) = snapshot.get("PWD").map(PathBuf::from) {
                if pwd.is_absolute() && pwd.is_dir() {
                    state.working_dir = pwd;
                }
            }
            tracing::debug!(vars = snapshot.len(), "Replacing environment snapshot");
            state.env = snapshot;
        }

        Ok(outcome.result)
    }

    /// Handle a prompt as a local direct or indirect command.
    ///
    /// # Errors
    /// Returns error on a blank prompt or a rejected directory change.
    pub async fn run_local(&self, prompt: &str) -> Result<LocalOutcome, SessionError> {
        if prompt.trim().is_empty() {
            return Err(SessionError::EmptyPrompt);
        }

        let command = match LocalCommand::classify(prompt) {
            LocalCommand::Indirect(text) => {
                tracing::info!(prompt = %text, "Indirect prompt received");
                return Ok(LocalOutcome::Indirect(text));
            }
            LocalCommand::Direct(command) => command,
        };

        let mut state = self.state.lock().await;
        match command.run(&self.shell, &state).await? {
            DirectOutcome::Changed(path) => {
                tracing::info!(dir = %path.display(), "Changed directory");
                state.working_dir.clone_from(&path);
                Ok(LocalOutcome::ChangedDir(path))
            }
            DirectOutcome::Ran(result) => Ok(LocalOutcome::Ran(result)),
        }
    }

    /// Copy of the current environment snapshot.
    pub async fn snapshot(&self) -> EnvironmentSnapshot {
        self.state.lock().await.env.clone()
    }

    /// Current working directory.
    pub async fn working_dir(&self) -> PathBuf {
        self.state.lock().await.working_dir.clone()
    }
}
