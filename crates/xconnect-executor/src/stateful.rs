//! Stateful shell executor.

use std::path::PathBuf;

use async_trait::async_trait;
use xconnect_core::{
    EnvironmentSnapshot, ExecutionContext, ExecutionOutcome, ExecutionResult, Executor,
    ExecutorError,
};
use xconnect_shell::UnixShell;

use crate::{
    command::{ShellInvocation, split_output},
    process::{run_script, to_result},
};

/// Executor that reconstructs shell state across independent invocations.
///
/// Each command starts from the caller's snapshot; the environment the shell
/// leaves behind is recovered from a dump that follows a per-invocation
/// sentinel on stdout.
#[derive(Debug, Clone)]
pub struct StatefulExecutor {
    shell: UnixShell,
    profile: PathBuf,
}

impl StatefulExecutor {
    #[must_use]
    pub const fn new(shell: UnixShell, profile: PathBuf) -> Self {
        Self { shell, profile }
    }
}

#[async_trait]
impl Executor for StatefulExecutor {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        prompt: &str,
    ) -> Result<ExecutionOutcome, ExecutorError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ExecutorError::EmptyPrompt);
        }
        if !self.profile.is_file() {
            tracing::error!(profile = %self.profile.display(), "Agent profile missing");
            return Err(ExecutorError::ProfileNotFound(self.profile.clone()));
        }

        let invocation =
            ShellInvocation::new(&self.profile).prelude(self.shell.prelude().iter().copied());
        let script = invocation
            .build()
            .map_err(|_| ExecutorError::ProfileNotFound(self.profile.clone()))?;

        tracing::info!(prompt, cwd = %ctx.working_dir.display(), "Executing command");
        let output = run_script(&self.shell, &script, &[prompt], ctx).await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let split = split_output(&stdout, invocation.sentinel());
        let snapshot = split.env_dump.map(EnvironmentSnapshot::parse_dump);
        if snapshot.is_none() {
            tracing::warn!(prompt, "Sentinel missing, keeping previous environment");
        }

        let result = ExecutionResult {
            stdout: split.output.to_string(),
            ..to_result(&output)
        };
        tracing::debug!(
            exit_code = result.exit_code,
            vars = snapshot.as_ref().map(EnvironmentSnapshot::len),
            "Command finished"
        );

        Ok(ExecutionOutcome { result, snapshot })
    }
}
