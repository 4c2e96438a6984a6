//! Invocation building and sentinel post-processing.
//!
//! A command runs as a single shell script that sources the profile, runs the
//! user's command, prints a sentinel and dumps the resulting environment.
//! Steps are newline-separated so the dump runs whether or not the command
//! succeeds. The prompt never becomes script text: it arrives as `$1` and runs
//! through `eval`, so a dangling `\`, `&&` or here-doc cannot reach the
//! protocol lines. `PWD` is exported before the dump so the working directory
//! always travels with the snapshot.

use std::path::PathBuf;

use uuid::Uuid;
use xconnect_shell::{ShellError, UnixShell};

/// Shell local holding the user command's exit status.
const STATUS_VAR: &str = "__xconnect_status";

/// Shell local holding the prompt, copied from `$1` before the profile can
/// touch the positional parameters.
const PROMPT_VAR: &str = "__xconnect_prompt";

/// Dump step. `command -p` searches the default `PATH`, so a command that
/// breaks `PATH` still gets its environment recorded.
const DUMP_COMMAND: &str = "command -p env";

/// Builder for one environment-carrying invocation.
#[derive(Debug, Clone)]
pub struct ShellInvocation {
    /// Profile sourced before the command.
    pub profile: PathBuf,
    /// Lines run before the profile is sourced.
    pub prelude: Vec<String>,
    sentinel: String,
}

impl ShellInvocation {
    /// Create an invocation with a fresh sentinel.
    #[must_use]
    pub fn new<P: Into<PathBuf>>(profile: P) -> Self {
        Self {
            profile: profile.into(),
            prelude: Vec::new(),
            sentinel: new_sentinel(),
        }
    }

    /// Add prelude lines.
    #[must_use]
    pub fn prelude<I>(mut self, lines: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.prelude.extend(lines.into_iter().map(Into::into));
        self
    }

    /// Token separating command output from the environment dump.
    #[must_use]
    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    /// Build the script. The prompt is passed as its first positional
    /// argument.
    ///
    /// # Errors
    /// Returns error if the profile path cannot be quoted.
    pub fn build(&self) -> Result<String, ShellError> {
        let mut lines = vec![format!("{PROMPT_VAR}=$1")];
        lines.extend(self.prelude.iter().cloned());
        lines.push(UnixShell::source_command(&self.profile)?);
        lines.push(format!("eval \"${PROMPT_VAR}\""));
        lines.push(format!("{STATUS_VAR}=$?"));
        lines.push("export PWD".to_string());
        lines.push(format!("printf '\\n%s\\n' '{}'", self.sentinel));
        lines.push(DUMP_COMMAND.to_string());
        lines.push(format!("exit \"${STATUS_VAR}\""));
        Ok(lines.join("\n"))
    }
}

fn new_sentinel() -> String {
    format!("__XCONNECT_ENV_{}__", Uuid::new_v4().simple())
}

/// Captured stdout split at the sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitOutput<'a> {
    /// The command's own output, trimmed.
    pub output: &'a str,
    /// Environment dump, or `None` if the sentinel never printed.
    pub env_dump: Option<&'a str>,
}

/// Split captured stdout at the first occurrence of `sentinel`.
#[must_use]
pub fn split_output<'a>(stdout: &'a str, sentinel: &str) -> SplitOutput<'a> {
    match stdout.split_once(sentinel) {
        Some((output, dump)) => SplitOutput {
            output: output.trim(),
            env_dump: Some(dump),
        },
        None => SplitOutput {
            output: stdout.trim(),
            env_dump: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_orders_steps() {
        let inv = ShellInvocation::new("/etc/agentrc").prelude(["shopt -s expand_aliases"]);
        let script = inv.build().unwrap();
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines[0], "__xconnect_prompt=$1");
        assert_eq!(lines[1], "shopt -s expand_aliases");
        assert_eq!(lines[2], ". /etc/agentrc");
        assert_eq!(lines[3], "eval \"$__xconnect_prompt\"");
        assert_eq!(lines[4], "__xconnect_status=$?");
        assert_eq!(lines[5], "export PWD");
        assert!(lines[6].contains(inv.sentinel()));
        assert_eq!(lines[7], "command -p env");
        assert_eq!(lines[8], "exit \"$__xconnect_status\"");
    }

    #[test]
    fn test_sentinels_are_unique() {
        let a = ShellInvocation::new("/p");
        let b = ShellInvocation::new("/p");
        assert_ne!(a.sentinel(), b.sentinel());
        assert!(a.sentinel().starts_with("__XCONNECT_ENV_"));
    }

    #[test]
    fn test_split_output_with_sentinel() {
        let stdout = "hello\n\nSENT\nA=1\nB=2\n";
        let split = split_output(stdout, "SENT");
        assert_eq!(split.output, "hello");
        assert_eq!(split.env_dump, Some("\nA=1\nB=2\n"));
    }

    #[test]
    fn test_split_output_without_sentinel() {
        let split = split_output("  partial output\n", "SENT");
        assert_eq!(split.output, "partial output");
        assert_eq!(split.env_dump, None);
    }
}
