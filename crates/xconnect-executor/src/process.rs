//! Shell process spawning.

use std::process::{Output, Stdio};

use command_group::AsyncCommandGroup;
use tokio::process::Command;
use xconnect_core::{ExecutionContext, ExecutionResult};
use xconnect_shell::UnixShell;

/// `$0` of every script.
const SCRIPT_NAME: &str = "xconnect";

/// Run `script` under `shell`, starting from `ctx`.
///
/// `args` become the script's positional parameters `$1`, `$2`, ...
///
/// The child sees only the context's environment and working directory,
/// never the hosting process's own. It runs in its own process group, which
/// is killed if the future is dropped.
///
/// # Errors
/// Returns error if the shell cannot be spawned or waited on.
pub async fn run_script(
    shell: &UnixShell,
    script: &str,
    args: &[&str],
    ctx: &ExecutionContext,
) -> std::io::Result<Output> {
    let (program, flag) = shell.get_shell_command();
    let mut cmd = Command::new(program);
    cmd.arg(flag)
        .arg(script)
        .arg(SCRIPT_NAME)
        .args(args)
        .env_clear()
        .envs(ctx.env.iter())
        .current_dir(&ctx.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.group_spawn()?;
    child.wait_with_output().await
}

/// Trimmed result of a finished shell process.
#[must_use]
pub fn to_result(output: &Output) -> ExecutionResult {
    ExecutionResult {
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        exit_code: output.status.code().unwrap_or(-1),
    }
}
